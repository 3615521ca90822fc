//! The repository archive: a flat directory of local git clones.
//!
//! [`ArchiveManager`] owns the archive root and implements every archive
//! operation on top of a [`VcsClient`](crate::git::VcsClient).  Nothing is
//! persisted beyond the directory tree and each clone's own git metadata.

pub mod entry;
pub mod error;
pub mod manager;
pub mod scan;

pub use entry::EntryDetails;
pub use error::ArchiveError;
pub use manager::{ArchiveManager, UpdateSummary};
