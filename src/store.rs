//! Credential persistence.
//!
//! The token pair lives in a small key-value store under two fixed keys.
//! The store is injected so the session logic never assumes a medium:
//! `FileStore` keeps a JSON object on disk per profile, `MemoryStore` is
//! used by tests and throwaway sessions.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const ACCESS_KEY: &str = "accessToken";
pub const REFRESH_KEY: &str = "refreshToken";

// ── Key-value capability ──────────────────────────────────────────────────────

/// Synchronous get/set/remove. Implementations must not fail loudly: a value
/// that can't be read is reported as absent.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

/// JSON object file, rewritten in full on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`. An unreadable or corrupt
    /// file is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt credential file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, values }
    }

    fn flush(&self) {
        if let Err(e) = write_json(&self.path, &self.values) {
            tracing::error!(path = %self.path.display(), error = %e, "failed to persist credentials");
        }
    }
}

fn write_json(path: &Path, values: &BTreeMap<String, String>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if values.is_empty() {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        return Ok(());
    }
    let contents = serde_json::to_string_pretty(values)?;

    // bearer tokens: owner-only
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        // mode() only applies on create
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(contents.as_bytes())?;
    }

    #[cfg(not(unix))]
    std::fs::write(path, contents)?;

    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
        self.flush();
    }

    fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.flush();
        }
    }
}

// ── Token pair ────────────────────────────────────────────────────────────────

/// Access + refresh credential. Both or neither: an absent session is
/// `Option::<TokenPair>::None`, never a half-filled pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

pub struct TokenStore<S> {
    backend: S,
}

impl<S: KeyValueStore> TokenStore<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    pub fn save(&mut self, pair: &TokenPair) {
        self.backend.set(ACCESS_KEY, &pair.access);
        self.backend.set(REFRESH_KEY, &pair.refresh);
    }

    /// Missing keys mean no session; a lone key is treated the same way.
    pub fn load(&self) -> Option<TokenPair> {
        let access = self.backend.get(ACCESS_KEY)?;
        let refresh = self.backend.get(REFRESH_KEY)?;
        Some(TokenPair { access, refresh })
    }

    pub fn clear(&mut self) {
        self.backend.remove(ACCESS_KEY);
        self.backend.remove(REFRESH_KEY);
    }

    #[cfg(test)]
    pub fn backend(&self) -> &S {
        &self.backend
    }
}
