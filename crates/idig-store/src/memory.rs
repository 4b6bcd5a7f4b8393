use std::collections::HashMap;
use std::sync::RwLock;

use idig_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::{ObjectStore, RefStore};

/// In-memory, HashMap-based object and reference store.
///
/// Intended for tests and embedding. All state is held in memory behind
/// `RwLock`s for safe concurrent access. Objects are cloned on read/write.
pub struct InMemoryStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
    refs: RwLock<HashMap<String, ObjectId>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            refs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let mut map = self.objects.write().expect("lock poisoned");
        // Idempotent: if already present, skip (content-addressing guarantees
        // the same ID always maps to the same content).
        map.entry(id).or_insert_with(|| object.clone());
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }
}

impl RefStore for InMemoryStore {
    fn read_ref(&self, name: &str) -> StoreResult<Option<ObjectId>> {
        let map = self.refs.read().expect("lock poisoned");
        Ok(map.get(name).copied())
    }

    fn write_ref(&self, name: &str, target: ObjectId) -> StoreResult<()> {
        let mut map = self.refs.write().expect("lock poisoned");
        map.insert(name.to_string(), target);
        Ok(())
    }

    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        target: ObjectId,
    ) -> StoreResult<bool> {
        let mut map = self.refs.write().expect("lock poisoned");
        if map.get(name).copied() != expected {
            return Ok(false);
        }
        map.insert(name.to_string(), target);
        Ok(true)
    }

    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, ObjectId)>> {
        let map = self.refs.read().expect("lock poisoned");
        let mut refs: Vec<(String, ObjectId)> = map
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        refs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(refs)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("object_count", &self.len())
            .finish()
    }
}
