//! Basic-auth extraction and the `users.txt`-backed access policy.
//!
//! Each project directory carries a `users.txt`:
//!
//! ```text
//! # comments start with #
//! bruce:password1:TrenchA,TrenchB
//! viewer:viewpass:
//! legacy:oldpass
//! ```
//!
//! The third field lists trenches the user may write; `*` matches every
//! trench, an empty list grants read-only access. Two-field lines are the
//! legacy form and grant write access to all trenches.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use idig_sync::AccessPolicy;

struct UserEntry {
    password: String,
    access: Vec<String>,
}

/// Access policy parsed from a project's `users.txt`.
pub struct FileAccessPolicy {
    users: HashMap<String, UserEntry>,
}

impl FileAccessPolicy {
    /// Load and parse `users.txt`. Malformed lines are skipped with a warning.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text, path))
    }

    fn parse(text: &str, path: &Path) -> Self {
        let mut users = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 2 {
                tracing::warn!(file = %path.display(), line = lineno + 1, "syntax error in users file");
                continue;
            }
            let access = if fields.len() >= 3 {
                fields[2]
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            } else {
                // Legacy two-field line: write access to all trenches.
                vec!["*".to_string()]
            };
            users.insert(
                fields[0].to_string(),
                UserEntry {
                    password: fields[1].to_string(),
                    access,
                },
            );
        }
        Self { users }
    }
}

impl AccessPolicy for FileAccessPolicy {
    fn authenticate(&self, principal: &str, secret: &str) -> bool {
        self.users
            .get(principal)
            .is_some_and(|user| user.password == secret)
    }

    fn can_write_trench(&self, principal: &str, trench: &str) -> bool {
        self.users
            .get(principal)
            .is_some_and(|user| user.access.iter().any(|t| t == trench || t == "*"))
    }
}

/// Extract `(user, password)` from a Basic authorization header.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}
