//! Runtime Config Store
//!
//! Key-value settings with override semantics: a locally persisted value
//! always takes precedence over the environment default for that key.
//! Values are mutable at any time between calls, so callers must re-read
//! configuration on every use instead of caching it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::constants;

const CONFIG_FILE_NAME: &str = "config.json";

/// Default config file path under the platform data dir
pub fn default_config_path() -> PathBuf {
    constants::data_dir().join(CONFIG_FILE_NAME)
}

/// File-backed key-value store. Writes persist synchronously; a corrupt or
/// missing file reads as empty.
pub struct ConfigStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl ConfigStore {
    /// Open the store at the default location
    pub fn open_default() -> Self {
        Self::open(default_config_path())
    }

    /// Open the store at an explicit path
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = load_values(&path);
        Self {
            path,
            values: RwLock::new(values),
        }
    }

    /// Effective value for a key: stored override first, else the
    /// environment default.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(v) = self.values.read().get(key) {
            if !v.is_empty() {
                return Some(v.clone());
            }
        }
        constants::env_default(key)
    }

    /// Set a local override and persist
    pub fn set(&self, key: &str, value: &str) {
        let mut values = self.values.write();
        values.insert(key.to_string(), value.to_string());
        persist(&self.path, &values);
    }

    /// Remove a local override and persist. The environment default, if any,
    /// becomes visible again.
    pub fn clear(&self, key: &str) {
        let mut values = self.values.write();
        if values.remove(key).is_some() {
            persist(&self.path, &values);
        }
    }

    /// Effective values for every known key
    pub fn list(&self) -> BTreeMap<&'static str, Option<String>> {
        constants::CONFIG_KEYS
            .iter()
            .map(|&key| (key, self.get(key)))
            .collect()
    }
}

fn load_values(path: &Path) -> BTreeMap<String, String> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(_) => return BTreeMap::new(),
    };
    match serde_json::from_slice(&data) {
        Ok(values) => values,
        Err(e) => {
            log::warn!("Config file unreadable ({}), starting empty", e);
            BTreeMap::new()
        }
    }
}

fn persist(path: &Path, values: &BTreeMap<String, String>) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            log::error!("Failed to create config dir: {}", e);
            return;
        }
    }
    match serde_json::to_vec_pretty(values) {
        Ok(json) => {
            if let Err(e) = fs::write(path, json) {
                log::error!("Failed to write config file: {}", e);
            }
        }
        Err(e) => log::error!("Failed to serialize config: {}", e),
    }
}
