use idig_types::ObjectId;

use crate::error::StoreResult;
use crate::object::StoredObject;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. Content-addressing guarantees this:
///   the same data always produces the same ID.
/// - Write-then-link: write the object, verify the hash, then return the ID.
/// - Concurrent reads are always safe (objects are immutable).
/// - The store never interprets object contents — it is a pure key-value store.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its content-addressed ID.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content-addressed ID.
    ///
    /// If the object already exists, this is a no-op (idempotent).
    /// The returned ID is computed from the object's kind and data.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;
}

/// Storage backend for named references.
///
/// References are the only mutable state in the store: path-like names
/// (`HEAD`, `refs/attachments/...`) pointing at object hashes. Implementations
/// must be thread-safe and must guarantee that a reference read never returns
/// a hash whose target is partially written.
pub trait RefStore: Send + Sync {
    /// Read a reference by name. Returns `Ok(None)` if it does not exist.
    fn read_ref(&self, name: &str) -> StoreResult<Option<ObjectId>>;

    /// Write (create or update) a reference, replacing any prior value.
    fn write_ref(&self, name: &str, target: ObjectId) -> StoreResult<()>;

    /// Atomically update a reference iff its current value equals `expected`
    /// (`None` = the reference must not exist yet).
    ///
    /// Returns `Ok(true)` when the swap happened, `Ok(false)` when the
    /// current value did not match. This is the linearization point for
    /// advancing a trench head: a concurrent writer that lost the race
    /// observes `false` and re-runs its protocol decision.
    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        target: ObjectId,
    ) -> StoreResult<bool>;

    /// List all references whose name starts with `prefix`, sorted by name.
    ///
    /// Pass `""` to list all references.
    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, ObjectId)>>;
}
