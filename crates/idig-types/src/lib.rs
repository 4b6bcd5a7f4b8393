//! Foundation types for the iDig sync server.
//!
//! This crate provides the identity and versioning types used throughout the
//! workspace. Every other `idig` crate depends on `idig-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Content-addressed identifier (BLAKE3 hash, hex on the wire)
//! - [`ContentHasher`] — Domain-separated hasher, one domain per object kind
//! - [`TrenchVersion`] — A `(commit hash, timestamp)` pair identifying a trench state

pub mod error;
pub mod hasher;
pub mod object;
pub mod version;

pub use error::TypeError;
pub use hasher::ContentHasher;
pub use object::ObjectId;
pub use version::TrenchVersion;
