use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use idig_store::{
    read_blob, read_commit, read_tree, tree_entry_at, Blob, CommitObject, CommitWalk, EntryMode,
    FsStore, InMemoryStore, ObjectStore, RefStore, Signature, TouchingWalk, Tree, TreeEntry,
    HEAD_REF,
};
use idig_survey::Survey;
use idig_types::{ObjectId, TrenchVersion};

use crate::error::{RepoError, RepoResult};
use crate::staging::staging_ref;

const SURVEYS_DIR: &str = "surveys";
const ATTACHMENTS_DIR: &str = "attachments";
const PREFERENCES_FILE: &str = "Preferences.json";
const SURVEY_SUFFIX: &str = ".survey";

/// One historical state of a single survey.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyVersion {
    pub version: ObjectId,
    pub date: DateTime<Utc>,
    pub survey: Survey,
}

/// Facade over the object store scoped to one trench.
///
/// Cheap to construct per request. `principal` becomes the author email of
/// any commit produced; `read_only` makes every write entry point fail with
/// [`RepoError::Forbidden`].
pub struct TrenchRepository<S> {
    store: S,
    principal: String,
    trench: String,
    read_only: bool,
}

impl TrenchRepository<FsStore> {
    /// Open (lazily creating) the on-disk trench at `dir`.
    pub fn open(dir: &Path, principal: impl Into<String>, trench: impl Into<String>) -> RepoResult<Self> {
        let store = FsStore::open(dir)?;
        Ok(Self::new(store, principal, trench))
    }
}

impl TrenchRepository<InMemoryStore> {
    /// An ephemeral in-memory trench, for tests and embedding.
    pub fn in_memory(principal: impl Into<String>, trench: impl Into<String>) -> Self {
        Self::new(InMemoryStore::new(), principal, trench)
    }
}

impl<S> TrenchRepository<S> {
    /// Wrap an existing store.
    pub fn new(store: S, principal: impl Into<String>, trench: impl Into<String>) -> Self {
        Self {
            store,
            principal: principal.into(),
            trench: trench.into(),
            read_only: false,
        }
    }

    /// Mark this handle read-only. All write entry points then fail with
    /// [`RepoError::Forbidden`].
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn trench(&self) -> &str {
        &self.trench
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the handle and give the store back.
    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: ObjectStore + RefStore> TrenchRepository<S> {
    // -----------------------------------------------------------------------
    // Head and versions
    // -----------------------------------------------------------------------

    /// The current head commit, or `None` for a fresh trench.
    pub fn head(&self) -> RepoResult<Option<ObjectId>> {
        Ok(self.store.read_ref(HEAD_REF)?)
    }

    /// Head commit metadata, or `None` for a fresh trench.
    pub fn version(&self) -> RepoResult<Option<TrenchVersion>> {
        let Some(head) = self.head()? else {
            return Ok(None);
        };
        let commit = read_commit(&self.store, &head)?;
        Ok(Some(TrenchVersion::new(head, commit.timestamp())))
    }

    /// All versions reachable from the head, newest first.
    pub fn list_versions(&self) -> RepoResult<Vec<TrenchVersion>> {
        let mut versions = Vec::new();
        for item in CommitWalk::new(&self.store, self.head()?) {
            let (id, commit) = item?;
            versions.push(TrenchVersion::new(id, commit.timestamp()));
        }
        Ok(versions)
    }

    /// Resolve a version string to a commit.
    ///
    /// Accepts the canonical full hex form or a prefix of at least four
    /// characters; a prefix is matched against the head chain and the first
    /// (newest) match wins.
    pub fn resolve_version(&self, version: &str) -> RepoResult<(ObjectId, CommitObject)> {
        let invalid = || RepoError::InvalidVersion(version.to_string());

        if version.len() == ObjectId::HEX_LEN {
            let id = ObjectId::from_hex(version).map_err(|_| invalid())?;
            let commit = match self.store.read(&id)? {
                Some(obj) => CommitObject::from_stored_object(&obj).map_err(|_| invalid())?,
                None => return Err(invalid()),
            };
            return Ok((id, commit));
        }

        if version.len() >= ObjectId::MIN_PREFIX
            && version.chars().all(|c| c.is_ascii_hexdigit())
        {
            for item in CommitWalk::new(&self.store, self.head()?) {
                let (id, commit) = item?;
                if id.to_hex().starts_with(version) {
                    return Ok((id, commit));
                }
            }
        }
        Err(invalid())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// All surveys at the head, or an empty list for a fresh trench.
    pub fn read_surveys(&self) -> RepoResult<Vec<Survey>> {
        match self.head()? {
            Some(head) => {
                let commit = read_commit(&self.store, &head)?;
                self.read_surveys_at_commit(&commit)
            }
            None => Ok(Vec::new()),
        }
    }

    /// All surveys at a specific version.
    pub fn read_surveys_at_version(&self, version: &str) -> RepoResult<Vec<Survey>> {
        let (_, commit) = self.resolve_version(version)?;
        self.read_surveys_at_commit(&commit)
    }

    fn read_surveys_at_commit(&self, commit: &CommitObject) -> RepoResult<Vec<Survey>> {
        let root = read_tree(&self.store, &commit.tree)?;
        let Some(surveys_entry) = root.get(SURVEYS_DIR) else {
            return Ok(Vec::new());
        };
        let surveys_tree = read_tree(&self.store, &surveys_entry.object_id)?;

        let mut surveys = Vec::new();
        for entry in &surveys_tree.entries {
            if entry.name.starts_with('.') || !entry.mode.is_file() {
                tracing::warn!(trench = %self.trench, entry = %entry.name, "skipping survey entry");
                continue;
            }
            surveys.push(self.decode_survey(&entry.name, &entry.object_id)?);
        }
        Ok(surveys)
    }

    /// One survey at a specific version.
    pub fn read_survey_at_version(&self, id: &str, version: &str) -> RepoResult<Survey> {
        let (_, commit) = self.resolve_version(version)?;
        self.read_survey_at_commit(id, &commit)?
            .ok_or_else(|| RepoError::SurveyNotFound(id.to_string()))
    }

    fn read_survey_at_commit(&self, id: &str, commit: &CommitObject) -> RepoResult<Option<Survey>> {
        let name = format!("{id}{SURVEY_SUFFIX}");
        match tree_entry_at(&self.store, &commit.tree, &[SURVEYS_DIR, &name])? {
            Some(blob_id) => Ok(Some(self.decode_survey(&name, &blob_id)?)),
            None => Ok(None),
        }
    }

    /// Every historical state of one survey, newest first.
    ///
    /// Walks the commits touching `surveys/<id>.survey`; versions where the
    /// survey is absent (it was removed by a snapshot) are skipped.
    pub fn read_all_survey_versions(&self, id: &str) -> RepoResult<Vec<SurveyVersion>> {
        let name = format!("{id}{SURVEY_SUFFIX}");
        let mut versions = Vec::new();
        for item in TouchingWalk::new(&self.store, self.head()?, &[SURVEYS_DIR, &name]) {
            let (commit_id, commit) = item?;
            if let Some(survey) = self.read_survey_at_commit(id, &commit)? {
                versions.push(SurveyVersion {
                    version: commit_id,
                    date: commit.timestamp(),
                    survey,
                });
            }
        }
        Ok(versions)
    }

    /// Preferences at the head; a fresh trench reads as empty bytes.
    pub fn read_preferences(&self) -> RepoResult<Vec<u8>> {
        match self.head()? {
            Some(head) => {
                let commit = read_commit(&self.store, &head)?;
                self.read_preferences_at_commit(&commit)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Preferences at a specific version.
    pub fn read_preferences_at_version(&self, version: &str) -> RepoResult<Vec<u8>> {
        let (_, commit) = self.resolve_version(version)?;
        self.read_preferences_at_commit(&commit)
    }

    fn read_preferences_at_commit(&self, commit: &CommitObject) -> RepoResult<Vec<u8>> {
        match tree_entry_at(&self.store, &commit.tree, &[PREFERENCES_FILE])? {
            Some(blob_id) => Ok(read_blob(&self.store, &blob_id)?),
            None => Ok(Vec::new()),
        }
    }

    fn decode_survey(&self, name: &str, blob_id: &ObjectId) -> RepoResult<Survey> {
        let data = read_blob(&self.store, blob_id)?;
        serde_json::from_slice(&data).map_err(|e| RepoError::InvalidSurvey {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Commit a full trench snapshot: preferences plus every survey.
    ///
    /// Attachments referenced by the surveys must already be staged. Returns
    /// the new head, or the unchanged head when the snapshot is identical to
    /// the current state.
    pub fn write_trench(
        &self,
        device: &str,
        message: &str,
        preferences: &[u8],
        surveys: &[Survey],
    ) -> RepoResult<ObjectId> {
        if self.read_only {
            return Err(RepoError::Forbidden);
        }
        let parent = self.head()?;
        let preferences_id = self.put_blob(preferences)?;

        // Survey identity uniqueness is enforced by filename: a later survey
        // with a duplicate ID replaces the earlier one.
        let mut survey_entries: BTreeMap<String, TreeEntry> = BTreeMap::new();
        let mut attachment_blobs: BTreeMap<String, ObjectId> = BTreeMap::new();
        for survey in surveys {
            let name = format!("{}{SURVEY_SUFFIX}", survey.id());
            let blob_id = self.put_blob(&survey.to_canonical_json())?;
            survey_entries.insert(
                name.clone(),
                TreeEntry::new(EntryMode::Regular, name, blob_id),
            );

            for attachment in survey.attachments() {
                let blob_id = self.staged_attachment(&attachment.name, &attachment.checksum)?;
                match attachment_blobs.entry(attachment.name) {
                    Entry::Occupied(entry) if *entry.get() != blob_id => {
                        return Err(RepoError::ConflictingAttachment {
                            name: entry.key().clone(),
                        });
                    }
                    Entry::Occupied(_) => {}
                    Entry::Vacant(entry) => {
                        entry.insert(blob_id);
                    }
                }
            }
        }

        let surveys_tree = self.put_tree(survey_entries.into_values().collect())?;
        let attachments_tree = self.put_tree(
            attachment_blobs
                .into_iter()
                .map(|(name, blob_id)| TreeEntry::new(EntryMode::Regular, name, blob_id))
                .collect(),
        )?;
        let root = self.put_tree(vec![
            TreeEntry::new(EntryMode::Directory, ATTACHMENTS_DIR, attachments_tree),
            TreeEntry::new(EntryMode::Directory, SURVEYS_DIR, surveys_tree),
            TreeEntry::new(EntryMode::Regular, PREFERENCES_FILE, preferences_id),
        ])?;

        self.commit_tree(device, message, root, parent)
    }

    /// Commit a change to `Preferences.json` only; surveys and attachments
    /// are carried over hash-for-hash from the parent.
    pub fn write_preferences(&self, preferences: &[u8]) -> RepoResult<ObjectId> {
        if self.read_only {
            return Err(RepoError::Forbidden);
        }
        let parent = self.head()?;

        let mut entries = Vec::new();
        if let Some(parent_id) = parent {
            let parent_commit = read_commit(&self.store, &parent_id)?;
            let root = read_tree(&self.store, &parent_commit.tree)?;
            for name in [ATTACHMENTS_DIR, SURVEYS_DIR] {
                if let Some(entry) = root.get(name) {
                    entries.push(entry.clone());
                }
            }
        }
        let preferences_id = self.put_blob(preferences)?;
        entries.push(TreeEntry::new(
            EntryMode::Regular,
            PREFERENCES_FILE,
            preferences_id,
        ));
        let root = self.put_tree(entries)?;

        self.commit_tree("terminal", "Import Preferences", root, parent)
    }

    /// Restore the trench to the state of `version` with a new commit on top
    /// of the current head. History is preserved.
    pub fn rollback(&self, version: &str) -> RepoResult<ObjectId> {
        if self.read_only {
            return Err(RepoError::Forbidden);
        }
        let (_, commit) = self.resolve_version(version)?;
        let parent = self.head()?;
        self.commit_tree("terminal", "Rollback", commit.tree, parent)
    }

    fn put_blob(&self, data: &[u8]) -> RepoResult<ObjectId> {
        Ok(self.store.write(&Blob::new(data.to_vec()).to_stored_object())?)
    }

    fn put_tree(&self, entries: Vec<TreeEntry>) -> RepoResult<ObjectId> {
        Ok(self.store.write(&Tree::new(entries).to_stored_object()?)?)
    }

    /// Create a commit for `tree` on top of `parent` and advance the head.
    ///
    /// A tree identical to the parent's is a no-op: the parent hash is
    /// returned and the head is unchanged. The head advance is a
    /// compare-and-swap against `parent`; losing that race yields
    /// [`RepoError::HeadMoved`].
    fn commit_tree(
        &self,
        device: &str,
        message: &str,
        tree: ObjectId,
        parent: Option<ObjectId>,
    ) -> RepoResult<ObjectId> {
        if let Some(parent_id) = parent {
            let parent_commit = read_commit(&self.store, &parent_id)?;
            if parent_commit.tree == tree {
                return Ok(parent_id);
            }
        }

        let commit = CommitObject {
            tree,
            parent,
            author: Signature::new(device, &self.principal, Utc::now()),
            message: message.to_string(),
        };
        let commit_id = self.store.write(&commit.to_stored_object()?)?;

        if !self.store.compare_and_swap_ref(HEAD_REF, parent, commit_id)? {
            return Err(RepoError::HeadMoved);
        }
        tracing::debug!(
            trench = %self.trench,
            commit = %commit_id.short_hex(),
            "head advanced"
        );
        Ok(commit_id)
    }

    // -----------------------------------------------------------------------
    // Attachment staging
    // -----------------------------------------------------------------------

    /// Whether `(name, checksum)` has been staged.
    pub fn exists_attachment(&self, name: &str, checksum: &str) -> RepoResult<bool> {
        Ok(self.store.read_ref(&staging_ref(name, checksum))?.is_some())
    }

    /// Stage an attachment: store the blob, then make it reachable through
    /// its staging reference. Idempotent for identical content.
    pub fn write_attachment(&self, name: &str, checksum: &str, data: &[u8]) -> RepoResult<()> {
        if self.read_only {
            return Err(RepoError::Forbidden);
        }
        let blob_id = self.put_blob(data)?;
        self.store.write_ref(&staging_ref(name, checksum), blob_id)?;
        Ok(())
    }

    /// Read a staged attachment's bytes.
    pub fn read_attachment(&self, name: &str, checksum: &str) -> RepoResult<Vec<u8>> {
        let blob_id = self.staged_attachment(name, checksum)?;
        Ok(read_blob(&self.store, &blob_id)?)
    }

    fn staged_attachment(&self, name: &str, checksum: &str) -> RepoResult<ObjectId> {
        self.store
            .read_ref(&staging_ref(name, checksum))?
            .ok_or_else(|| RepoError::AttachmentNotFound {
                name: name.to_string(),
                checksum: checksum.to_string(),
            })
    }
}
