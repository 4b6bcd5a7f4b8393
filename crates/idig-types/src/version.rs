use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::object::ObjectId;

/// A `(commit hash, timestamp)` pair identifying one trench state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrenchVersion {
    /// Hash of the commit.
    pub version: ObjectId,
    /// Commit timestamp.
    pub date: DateTime<Utc>,
}

impl TrenchVersion {
    pub fn new(version: ObjectId, date: DateTime<Utc>) -> Self {
        Self { version, date }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_roundtrip() {
        let v = TrenchVersion::new(ObjectId::from_bytes(b"commit"), Utc::now());
        let json = serde_json::to_string(&v).unwrap();
        let parsed: TrenchVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(v, parsed);
    }

    #[test]
    fn serializes_version_as_hex() {
        let id = ObjectId::from_bytes(b"commit");
        let v = TrenchVersion::new(id, Utc::now());
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["version"], serde_json::json!(id.to_hex()));
    }
}
