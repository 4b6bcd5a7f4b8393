use std::fmt;

use serde::{Deserialize, Serialize};

use idig_survey::{Patch, Survey};

/// Outcome of one sync decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Client is already in sync.
    Ok,
    /// New version committed.
    Pushed,
    /// Client is on an older version and needs to update first.
    Pull,
    /// Some attachments must be uploaded before the commit can happen.
    Missing,
    /// Principal has no write capability; updates carry the roll-back patches.
    Forbidden,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::Pushed => "pushed",
            Self::Pull => "pull",
            Self::Missing => "missing",
            Self::Forbidden => "forbidden",
        };
        write!(f, "{name}")
    }
}

/// One sync attempt from a device.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Device name making the request.
    #[serde(default)]
    pub device: String,
    /// Commit message (can be empty).
    #[serde(default)]
    pub message: String,
    /// Client's last sync version (can be empty).
    #[serde(default)]
    pub head: String,
    /// Preferences file, serialized.
    #[serde(default, with = "base64_bytes")]
    pub preferences: Vec<u8>,
    /// Surveys to be committed.
    #[serde(default)]
    pub surveys: Vec<Survey>,
}

/// The server's decision plus whatever the client needs to reconcile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncResponse {
    /// One of ok, pushed, pull, missing, forbidden.
    pub status: SyncStatus,
    /// Current version of the server.
    pub version: String,
    /// Serialized preferences, only when different from the client's.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes_opt")]
    pub preferences: Option<Vec<u8>>,
    /// Names of attachments that must be uploaded first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
    /// Patches the client needs to apply locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<Vec<Patch>>,
}

impl SyncResponse {
    /// A bare `{status, version}` response.
    pub fn new(status: SyncStatus, version: impl Into<String>) -> Self {
        Self {
            status,
            version: version.into(),
            preferences: None,
            missing: None,
            updates: None,
        }
    }
}

// Compact log forms: a sync line should fit a terminal, not dump payloads.

impl fmt::Display for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{head: {}, device: {}, surveys: [{} surveys]}}",
            prefix(&self.head, 7),
            self.device,
            self.surveys.len()
        )
    }
}

impl fmt::Display for SyncResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = prefix(&self.version, 7);
        write!(
            f,
            "{{status: {}, version: {}",
            self.status,
            if version.is_empty() { "-" } else { version }
        )?;
        if let Some(missing) = &self.missing {
            write!(f, ", missing: [{} attachments]", missing.len())?;
        }
        if let Some(preferences) = &self.preferences {
            write!(f, ", preferences: <{} bytes>", preferences.len())?;
        }
        if let Some(updates) = &self.updates {
            write!(f, ", updates: [{} patches]", updates.len())?;
        }
        write!(f, "}}")
    }
}

fn prefix(s: &str, n: usize) -> &str {
    &s[..s.len().min(n)]
}

/// `Vec<u8>` as a base64 string, the JSON convention for byte fields.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => STANDARD.decode(text).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// `Option<Vec<u8>>` as an optional base64 string.
mod base64_bytes_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => STANDARD
                .decode(text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
