/// Authentication and per-trench write capability.
///
/// The engine refuses all writes when `can_write_trench` returns `false` but
/// still serves reads for authenticated principals. Implementations are
/// polymorphic over their backing (file, in-memory, external service).
pub trait AccessPolicy: Send + Sync {
    /// Check a principal's credentials.
    fn authenticate(&self, principal: &str, secret: &str) -> bool;

    /// Whether the principal may write to the named trench.
    fn can_write_trench(&self, principal: &str, trench: &str) -> bool;
}

/// Policy that accepts every credential and grants every write.
///
/// For tests and embedding only.
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn authenticate(&self, _principal: &str, _secret: &str) -> bool {
        true
    }

    fn can_write_trench(&self, _principal: &str, _trench: &str) -> bool {
        true
    }
}
