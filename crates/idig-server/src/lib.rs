//! HTTP adapter for the iDig trench sync server.
//!
//! Binds the sync protocol and the trench repository to the HTTP surface:
//! Basic authentication on every route, a `users.txt`-backed access policy
//! per project, and per-trench commit locks so concurrent sync requests
//! against one trench serialize.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{basic_credentials, FileAccessPolicy};
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use server::IdigServer;
pub use state::{AppState, CommitLocks};
