use idig_repo::RepoError;
use idig_store::StoreError;

/// Errors from the sync protocol engine.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Repository failure underneath a protocol decision.
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Object store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
