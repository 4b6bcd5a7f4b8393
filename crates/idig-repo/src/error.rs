use idig_store::StoreError;

/// Errors from trench repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// The repository is read-only for this principal.
    #[error("forbidden")]
    Forbidden,

    /// The version string does not resolve to a commit.
    #[error("invalid version {0}")]
    InvalidVersion(String),

    /// No survey with this identity exists at the requested version.
    #[error("survey {0} not found")]
    SurveyNotFound(String),

    /// No staged or committed blob for this `(name, checksum)` pair.
    #[error("attachment '{name}' not found")]
    AttachmentNotFound { name: String, checksum: String },

    /// Two surveys in one commit reference the same attachment name with
    /// different contents.
    #[error("conflicting contents for attachment '{name}' in one commit")]
    ConflictingAttachment { name: String },

    /// A committed survey blob could not be decoded.
    #[error("error reading survey {name}: {reason}")]
    InvalidSurvey { name: String, reason: String },

    /// The head advanced underneath a commit attempt; the caller should
    /// re-run its protocol decision against the new head.
    #[error("head moved during commit")]
    HeadMoved,

    /// Underlying object store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;
