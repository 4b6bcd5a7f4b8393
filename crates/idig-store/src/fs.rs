//! Filesystem-backed object and reference store.
//!
//! On-disk layout, under the directory given at open:
//!
//! ```text
//! objects/aa/bbbb....   one file per object: "<kind> <size>\n" + raw bytes
//! refs/<path>           one file per reference: hex hash + "\n"
//! HEAD                  the head reference (absent until the first commit)
//! tmp/                  staging area for atomic writes
//! ```
//!
//! Every write lands in `tmp/` first and is published with `fs::rename`, so a
//! reader never observes a partially written object or reference, and a crash
//! mid-write leaves either the old state or the complete new state.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use idig_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::{ObjectStore, RefStore};

const OBJECTS_DIR: &str = "objects";
const REFS_DIR: &str = "refs";
const TMP_DIR: &str = "tmp";
const HEAD_FILE: &str = "HEAD";

/// Persistent on-disk store for one trench.
pub struct FsStore {
    root: PathBuf,
    /// Serializes read-compare-rename sequences on references.
    refs_lock: Mutex<()>,
    /// Monotonic counter for unique temp file names.
    tmp_seq: AtomicU64,
}

impl FsStore {
    /// Open the store at `root`, creating the directory layout if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(OBJECTS_DIR))?;
        fs::create_dir_all(root.join(REFS_DIR))?;
        fs::create_dir_all(root.join(TMP_DIR))?;
        Ok(Self {
            root,
            refs_lock: Mutex::new(()),
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// The directory this store lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(OBJECTS_DIR).join(&hex[..2]).join(&hex[2..])
    }

    fn ref_path(&self, name: &str) -> StoreResult<PathBuf> {
        validate_ref_name(name)?;
        if name == HEAD_FILE {
            return Ok(self.root.join(HEAD_FILE));
        }
        Ok(self.root.join(name))
    }

    /// Write `data` to `dest` atomically: temp file in `tmp/`, fsync, rename.
    fn write_atomic(&self, dest: &Path, data: &[u8]) -> StoreResult<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self
            .root
            .join(TMP_DIR)
            .join(format!("{}-{seq}", std::process::id()));
        let mut file = File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        if let Err(e) = fs::rename(&tmp, dest) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn read_ref_file(&self, path: &Path) -> StoreResult<Option<ObjectId>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let hex = text.trim();
        let id = ObjectId::from_hex(hex)
            .map_err(|e| StoreError::Serialization(format!("bad ref target {hex:?}: {e}")))?;
        Ok(Some(id))
    }

    fn collect_refs(
        &self,
        dir: &Path,
        name_prefix: &str,
        out: &mut Vec<(String, ObjectId)>,
    ) -> StoreResult<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let name = format!("{name_prefix}{file_name}");
            if entry.file_type()?.is_dir() {
                self.collect_refs(&entry.path(), &format!("{name}/"), out)?;
            } else if let Some(id) = self.read_ref_file(&entry.path())? {
                out.push((name, id));
            }
        }
        Ok(())
    }
}

impl ObjectStore for FsStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let path = self.object_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = decode_object(*id, &bytes)?;
        // Content-addressing integrity check on every read.
        if object.compute_id() != *id {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: "content hash does not match object ID".into(),
            });
        }
        Ok(Some(object))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let path = self.object_path(&id);
        // Idempotent: an existing file already holds identical content.
        if path.exists() {
            return Ok(id);
        }
        let mut data = Vec::with_capacity(object.data.len() + 16);
        data.extend_from_slice(format!("{} {}\n", object.kind, object.size).as_bytes());
        data.extend_from_slice(&object.data);
        self.write_atomic(&path, &data)?;
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).exists())
    }
}

impl RefStore for FsStore {
    fn read_ref(&self, name: &str) -> StoreResult<Option<ObjectId>> {
        let path = self.ref_path(name)?;
        self.read_ref_file(&path)
    }

    fn write_ref(&self, name: &str, target: ObjectId) -> StoreResult<()> {
        let path = self.ref_path(name)?;
        let _guard = self.refs_lock.lock().expect("lock poisoned");
        self.write_atomic(&path, format!("{}\n", target.to_hex()).as_bytes())
    }

    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<ObjectId>,
        target: ObjectId,
    ) -> StoreResult<bool> {
        let path = self.ref_path(name)?;
        let _guard = self.refs_lock.lock().expect("lock poisoned");
        if self.read_ref_file(&path)? != expected {
            return Ok(false);
        }
        self.write_atomic(&path, format!("{}\n", target.to_hex()).as_bytes())?;
        Ok(true)
    }

    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, ObjectId)>> {
        let mut refs = Vec::new();
        if HEAD_FILE.starts_with(prefix) {
            if let Some(id) = self.read_ref_file(&self.root.join(HEAD_FILE))? {
                refs.push((HEAD_FILE.to_string(), id));
            }
        }
        self.collect_refs(&self.root.join(REFS_DIR), "refs/", &mut refs)?;
        refs.retain(|(name, _)| name.starts_with(prefix));
        refs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(refs)
    }
}

impl std::fmt::Debug for FsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsStore").field("root", &self.root).finish()
    }
}

/// Decode an on-disk object file: `"<kind> <size>\n"` header + raw bytes.
fn decode_object(id: ObjectId, bytes: &[u8]) -> StoreResult<StoredObject> {
    let corrupt = |reason: &str| StoreError::CorruptObject {
        id,
        reason: reason.into(),
    };

    let newline = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| corrupt("missing header"))?;
    let header =
        std::str::from_utf8(&bytes[..newline]).map_err(|_| corrupt("header is not UTF-8"))?;
    let (kind_text, size_text) = header
        .split_once(' ')
        .ok_or_else(|| corrupt("malformed header"))?;
    let kind = ObjectKind::parse(kind_text)
        .ok_or_else(|| corrupt(&format!("unknown object kind {kind_text:?}")))?;
    let size: u64 = size_text
        .parse()
        .map_err(|_| corrupt("malformed size in header"))?;

    let data = &bytes[newline + 1..];
    if data.len() as u64 != size {
        return Err(corrupt(&format!(
            "size mismatch: header says {size}, file holds {}",
            data.len()
        )));
    }
    Ok(StoredObject::new(kind, data.to_vec()))
}

/// Reference names must be `HEAD` or live under `refs/`, with no empty or
/// traversing path components.
fn validate_ref_name(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidRefName {
        name: name.to_string(),
        reason: reason.into(),
    };

    if name == HEAD_FILE {
        return Ok(());
    }
    if !name.starts_with("refs/") {
        return Err(invalid("must be HEAD or start with refs/"));
    }
    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid("path components must not be empty"));
        }
        if component == "." || component == ".." {
            return Err(invalid("path components must not traverse"));
        }
        if component.contains('\\') {
            return Err(invalid("path components must not contain backslashes"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Blob;

    fn make_blob(content: &[u8]) -> StoredObject {
        Blob::new(content.to_vec()).to_stored_object()
    }

    fn temp_store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_layout() {
        let (dir, _store) = temp_store();
        assert!(dir.path().join("objects").is_dir());
        assert!(dir.path().join("refs").is_dir());
        assert!(dir.path().join("tmp").is_dir());
    }

    #[test]
    fn write_and_read_object() {
        let (_dir, store) = temp_store();
        let obj = make_blob(b"hello world");
        let id = store.write(&obj).unwrap();

        let read_back = store.read(&id).unwrap().expect("should exist");
        assert_eq!(read_back, obj);
    }

    #[test]
    fn object_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FsStore::open(dir.path()).unwrap();
            store.write(&make_blob(b"persistent")).unwrap()
        };
        let store = FsStore::open(dir.path()).unwrap();
        let obj = store.read(&id).unwrap().expect("should exist");
        assert_eq!(obj.data, b"persistent");
    }

    #[test]
    fn write_is_idempotent() {
        let (_dir, store) = temp_store();
        let obj = make_blob(b"idempotent");
        let id1 = store.write(&obj).unwrap();
        let id2 = store.write(&obj).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn read_missing_returns_none() {
        let (_dir, store) = temp_store();
        assert!(store.read(&ObjectId::from_bytes(b"missing")).unwrap().is_none());
        assert!(!store.exists(&ObjectId::from_bytes(b"missing")).unwrap());
    }

    #[test]
    fn corrupt_object_detected() {
        let (dir, store) = temp_store();
        let id = store.write(&make_blob(b"genuine")).unwrap();
        let hex = id.to_hex();
        let path = dir.path().join("objects").join(&hex[..2]).join(&hex[2..]);
        fs::write(&path, b"blob 7\ntampere").unwrap();

        let err = store.read(&id).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn head_ref_roundtrip() {
        let (dir, store) = temp_store();
        let id = store.write(&make_blob(b"commit")).unwrap();
        assert_eq!(store.read_ref("HEAD").unwrap(), None);
        store.write_ref("HEAD", id).unwrap();
        assert_eq!(store.read_ref("HEAD").unwrap(), Some(id));
        assert!(dir.path().join("HEAD").is_file());
    }

    #[test]
    fn nested_ref_roundtrip() {
        let (dir, store) = temp_store();
        let id = store.write(&make_blob(b"staged")).unwrap();
        store.write_ref("refs/attachments/cGhvdG8", id).unwrap();
        assert_eq!(store.read_ref("refs/attachments/cGhvdG8").unwrap(), Some(id));
        assert!(dir.path().join("refs/attachments/cGhvdG8").is_file());
    }

    #[test]
    fn ref_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FsStore::open(dir.path()).unwrap();
            let id = store.write(&make_blob(b"commit")).unwrap();
            store.write_ref("HEAD", id).unwrap();
            id
        };
        let store = FsStore::open(dir.path()).unwrap();
        assert_eq!(store.read_ref("HEAD").unwrap(), Some(id));
    }

    #[test]
    fn cas_on_head() {
        let (_dir, store) = temp_store();
        let id1 = store.write(&make_blob(b"one")).unwrap();
        let id2 = store.write(&make_blob(b"two")).unwrap();

        assert!(store.compare_and_swap_ref("HEAD", None, id1).unwrap());
        assert!(!store.compare_and_swap_ref("HEAD", None, id2).unwrap());
        assert!(store.compare_and_swap_ref("HEAD", Some(id1), id2).unwrap());
        assert_eq!(store.read_ref("HEAD").unwrap(), Some(id2));
    }

    #[test]
    fn list_refs_by_prefix() {
        let (_dir, store) = temp_store();
        let id = store.write(&make_blob(b"x")).unwrap();
        store.write_ref("refs/attachments/aaa", id).unwrap();
        store.write_ref("refs/attachments/bbb", id).unwrap();
        store.write_ref("HEAD", id).unwrap();

        let refs = store.list_refs("refs/attachments/").unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].0, "refs/attachments/aaa");

        let all = store.list_refs("").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].0, "HEAD");
    }

    #[test]
    fn rejects_traversing_ref_names() {
        let (_dir, store) = temp_store();
        let id = store.write(&make_blob(b"x")).unwrap();
        assert!(store.write_ref("refs/../escape", id).is_err());
        assert!(store.write_ref("refs//double", id).is_err());
        assert!(store.write_ref("config", id).is_err());
        assert!(store.read_ref("refs/../escape").is_err());
    }

    #[test]
    fn no_tmp_leftovers_after_writes() {
        let (dir, store) = temp_store();
        for i in 0..10 {
            store.write(&make_blob(format!("obj-{i}").as_bytes())).unwrap();
        }
        let leftovers = fs::read_dir(dir.path().join("tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
