//! Core domain logic for Driftboard: reconciling divergent task copies
//! across branches into one active view, plus the ordering, sequencing
//! and id-allocation layers built on top of it.

pub mod cancel;
pub mod config;
pub mod id;
pub mod ordinal;
pub mod reconcile;
pub mod scan;
pub mod sequence;
pub mod store;
pub mod task;
pub mod vcs;
pub mod view;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
