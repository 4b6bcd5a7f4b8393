//! Content-addressed object storage for the iDig sync server.
//!
//! This crate implements a hash-keyed object store analogous to git's
//! `.git/objects/` directory. Every piece of trench data -- survey blobs,
//! directory trees, commits -- is stored as an immutable object identified by
//! its BLAKE3 hash (domain-separated by object kind). Named references
//! (`HEAD`, `refs/attachments/...`) are the only mutable state.
//!
//! # Object Types
//!
//! - [`Blob`] -- raw content (survey snapshots, preferences, attachments)
//! - [`Tree`] -- directory listing mapping names to object references
//! - [`CommitObject`] -- a tree hash plus zero-or-one parent, author, message
//!
//! # Storage Backends
//!
//! All backends implement [`ObjectStore`] and [`RefStore`]:
//!
//! - [`InMemoryStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsStore`] -- persistent on-disk store with crash-safe writes
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: write the object, then update references.
//! 3. Concurrent reads are always safe (objects are immutable).
//! 4. A reference never points at a partially written object.
//! 5. The store never interprets object contents -- it is a pure key-value store.
//! 6. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;
pub mod walk;

pub use error::{StoreError, StoreResult};
pub use fs::FsStore;
pub use memory::InMemoryStore;
pub use object::{
    Blob, CommitObject, EntryMode, ObjectKind, Signature, StoredObject, Tree, TreeEntry,
};
pub use traits::{ObjectStore, RefStore};
pub use walk::{read_blob, read_commit, read_tree, tree_entry_at, CommitWalk, TouchingWalk};

/// Name of the head reference of a trench.
pub const HEAD_REF: &str = "HEAD";
