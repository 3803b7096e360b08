use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::warn;

/// Durable key-value storage the cache is layered on.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn delete(&self, key: &str);

    /// Drop every entry `keep` rejects. Stores that cannot enumerate their keys
    /// leave this as a no-op.
    fn retain(&self, keep: &dyn Fn(&str, &Value) -> bool) {
        let _ = keep;
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
    }

    fn retain(&self, keep: &dyn Fn(&str, &Value) -> bool) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).retain(|k, v| keep(k, v));
    }
}

/// JSON file backed store. Every mutation rewrites the file; the in-memory map
/// stays authoritative if a write fails.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

impl FileStore {
    /// Open the store at `path`. A missing or unreadable file starts the store
    /// empty; the next write replaces it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = if path.exists() {
            read_json(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "discarding unreadable cache file");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        Self { path, entries: Mutex::new(entries) }
    }

    /// Open the store at the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(Self::default_path()?))
    }

    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "prayer-times", "prayer-cli")
            .ok_or_else(|| anyhow!("Could not determine platform data directory"))?;

        Ok(dirs.data_dir().join("cache.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, Value>) {
        if let Err(e) = write_json(&self.path, entries) {
            warn!(path = %self.path.display(), error = %e, "failed to persist cache store");
        }
    }
}

fn read_json(path: &Path) -> Result<HashMap<String, Value>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cache file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse cache file: {}", path.display()))
}

/// Writes beside the target and renames over it, so a crash mid-write leaves the
/// previous file intact.
fn write_json(path: &Path, entries: &HashMap<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(entries).context("Failed to serialize cache store")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write cache file: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace cache file: {}", path.display()))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        self.persist(&entries);
    }

    fn delete(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.remove(key).is_some() {
            self.persist(&entries);
        }
    }

    fn retain(&self, keep: &dyn Fn(&str, &Value) -> bool) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|k, v| keep(k, v));
        if entries.len() != before {
            self.persist(&entries);
        }
    }
}
