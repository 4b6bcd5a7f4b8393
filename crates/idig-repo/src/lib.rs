//! Per-trench versioned repository.
//!
//! [`TrenchRepository`] is the facade over the object store scoped to one
//! trench: it owns the head pointer, walks commit ancestry, reads surveys and
//! preferences at any historical version, and produces new commits from full
//! trench snapshots.
//!
//! Attachments are staged out of band (uploaded before the commit that
//! references them) via named references outside the commit graph, so a
//! commit never references a missing blob.

pub mod error;
pub mod staging;
pub mod trench;

pub use error::{RepoError, RepoResult};
pub use staging::staging_ref;
pub use trench::{SurveyVersion, TrenchRepository};
