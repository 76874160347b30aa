//! Local key-value persistence.
//!
//! Values are opaque JSON strings keyed by name, mirroring the browser's
//! local storage. [`JsonFileStore`] keeps one `{key}.json` file per key under a
//! data directory; [`MemoryStore`] is non-persistent and used in tests.
//!
//! Stores never fail: write errors are logged and the in-memory copy stays
//! authoritative for the rest of the process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Key holding the serialized `UserPreferences`.
pub const USER_PROFILE_KEY: &str = "user_profile";
/// Key holding the serialized `StreakRecord`.
pub const STREAK_DATA_KEY: &str = "streak_data";

/// Minimal string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Write the raw value for `key`.
    fn set(&self, key: &str, value: &str);
}

/// Shared key-value store.
pub type SharedKeyValueStore = Arc<dyn KeyValueStore>;

/// In-memory store (non-persistent).
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
    }
}

/// JSON-file-backed store: `{dir}/{key}.json`.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`. The directory is created lazily on the
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        tracing::debug!("Using local store at {}", dir.display());
        Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    fn save_to_disk(&self, key: &str, value: &str) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write-then-rename so a crash never leaves a half-written value.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!("Saved {} to {}", key, path.display());
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(value) = cache.get(key) {
                return Some(value.clone());
            }
        }

        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
                cache.insert(key.to_string(), contents.clone());
                Some(contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(key.to_string(), value.to_string());
        }
        if let Err(e) = self.save_to_disk(key, value) {
            tracing::warn!(
                "Failed to persist {} under {}: {}",
                key,
                self.dir.display(),
                e
            );
        }
    }
}
