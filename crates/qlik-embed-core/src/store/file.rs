// ── File-backed key-value store ──
//
// A single JSON object on disk, rewritten on every mutation. Lets the
// redirect guard and cached tokens survive between CLI runs.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::kv::KeyValueStore;

/// JSON file store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<IndexMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring corrupt store file");
                IndexMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read store file");
                IndexMap::new()
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "opened store");
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &IndexMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "cannot create store directory");
                return;
            }
        }
        let text = match serde_json::to_string_pretty(entries) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "cannot encode store");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, text) {
            warn!(path = %self.path.display(), error = %e, "cannot write store file");
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        if entries.shift_remove(key).is_some() {
            self.persist(&entries);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}
