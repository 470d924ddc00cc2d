//! Git and filesystem collaborators for Driftboard: a `git`-subprocess
//! implementation of the VCS seam and a markdown-front-matter task store.

pub mod codec;
pub mod store;
pub mod vcs;

pub use store::FsStore;
pub use vcs::GitVcs;
