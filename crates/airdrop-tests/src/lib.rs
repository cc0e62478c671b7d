//! Integration tests spanning the airdrop crates.
//!
//! Every test drives the same pipeline the binary runs (window resolution,
//! schedule, event collection, replay) over offline snapshots, so results
//! are reproducible without a node.

pub mod helpers;
