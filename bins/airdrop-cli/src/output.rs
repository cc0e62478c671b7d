//! Reward file and console summary.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use airdrop_core::constants::SUMMARY_DECIMAL_PLACES;
use airdrop_core::{AirdropSummary, RewardEntry};
use anyhow::{Context, Result};

/// Sibling path the reward file is staged at before the final rename.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("reward.json"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the ranked reward list as a pretty-printed JSON array.
///
/// The list is staged next to `path` and renamed into place, so a reader
/// never sees a partial file and a failed write leaves any previous file
/// untouched.
pub fn write_rewards(path: &Path, rewards: &[RewardEntry]) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(rewards).context("failed to encode reward list")?;
    data.push(b'\n');

    let staging = staging_path(path);
    fs::write(&staging, &data)
        .with_context(|| format!("failed to write {}", staging.display()))?;
    if let Err(e) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(e).with_context(|| format!("failed to move reward file to {}", path.display()));
    }
    Ok(())
}

/// Human-readable run summary.
pub fn render_summary(summary: &AirdropSummary) -> String {
    format!(
        "total supply:      {}\n\
         holders:           {}\n\
         recipients:        {}\n\
         expected total:    {}\n\
         distributed:       {}\n\
         distributed (int): {}",
        summary.total_supply,
        summary.holder_count,
        summary.recipient_count,
        summary.expected_total,
        summary.distributed_decimal(SUMMARY_DECIMAL_PLACES),
        summary.distributed_truncated,
    )
}
