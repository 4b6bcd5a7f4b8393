use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Key holding a survey's identity.
pub const IDENTIFIER_KEY: &str = "IdentifierUUID";

/// Key holding a survey's embedded attachment list.
pub const ATTACHMENTS_KEY: &str = "RelationAttachments";

/// A binary asset referenced by a survey, addressed by `(name, checksum)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attachment {
    pub name: String,
    pub checksum: String,
}

/// One structured field record: a mapping from string keys to string values.
///
/// The ordered map gives deterministic serialization: two surveys with the
/// same content always produce identical snapshot bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Survey(BTreeMap<String, String>);

impl Survey {
    /// Create an empty survey.
    pub fn new() -> Self {
        Self::default()
    }

    /// The survey's identity: the value at `IdentifierUUID`.
    ///
    /// A missing identity is a warning, not a fatal error; the empty string
    /// is returned in that case.
    pub fn id(&self) -> &str {
        match self.0.get(IDENTIFIER_KEY) {
            Some(id) if !id.is_empty() => id,
            _ => {
                tracing::warn!(survey = ?self.0, "survey is missing its identifier");
                ""
            }
        }
    }

    /// Value for `key`; absent keys read as the empty string.
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    /// Set a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// All keys present in this survey.
    pub fn keys(&self) -> BTreeSet<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Returns `true` if the survey has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Structural equality: for every key in the union of both key sets the
    /// values must match, with an absent key reading as the empty string.
    pub fn is_equal(&self, other: &Survey) -> bool {
        let mut keys = self.keys();
        keys.extend(other.keys());
        keys.iter().all(|key| self.get(key) == other.get(key))
    }

    /// The attachments referenced by this survey.
    ///
    /// Parsed from the `RelationAttachments` value: blocks separated by a
    /// blank line, each block holding `k=v` lines where `n` names the
    /// attachment and `d` gives its checksum. Blocks missing either key are
    /// ignored.
    pub fn attachments(&self) -> Vec<Attachment> {
        let mut attachments = Vec::new();
        for block in self.get(ATTACHMENTS_KEY).split("\n\n") {
            let mut name = "";
            let mut checksum = "";
            for line in block.split('\n') {
                if let Some((key, value)) = line.split_once('=') {
                    match key {
                        "n" => name = value,
                        "d" => checksum = value,
                        _ => {}
                    }
                }
            }
            if !name.is_empty() && !checksum.is_empty() {
                attachments.push(Attachment {
                    name: name.to_string(),
                    checksum: checksum.to_string(),
                });
            }
        }
        attachments
    }

    /// Canonical snapshot bytes: sorted keys, two-space indent.
    pub fn to_canonical_json(&self) -> Vec<u8> {
        // BTreeMap keeps keys ordered, so pretty-printing is deterministic.
        serde_json::to_vec_pretty(self).expect("string map serialization cannot fail")
    }
}

impl FromIterator<(String, String)> for Survey {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
