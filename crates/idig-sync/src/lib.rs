//! Sync protocol state machine.
//!
//! Given a client's last-known version, a proposed set of surveys, and the
//! staged attachments, [`sync`] decides among `ok`, `pushed`, `pull`,
//! `missing`, and `forbidden`, and emits the minimal patch set a client needs
//! to reconcile. The decision order is fixed; the `pull` check precedes any
//! write attempt so a stale client can never clobber newer server state.
//!
//! [`AccessPolicy`] is the capability interface the engine consults;
//! implementations (file-backed, in-memory) live with their owners.

pub mod engine;
pub mod error;
pub mod message;
pub mod policy;

pub use engine::sync;
pub use error::{SyncError, SyncResult};
pub use message::{SyncRequest, SyncResponse, SyncStatus};
pub use policy::{AccessPolicy, AllowAll};
