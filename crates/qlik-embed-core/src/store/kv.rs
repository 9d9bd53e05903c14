// ── Persisted key-value store ──
//
// The negotiator keeps two kinds of state across activations: the one-shot
// redirect guard and cached bearer tokens. Both live behind this trait so
// an embedding host can plug in whatever storage survives its navigations.

use std::sync::RwLock;

use indexmap::IndexMap;

/// String key-value storage that remembers insertion order.
///
/// Operations are infallible from the caller's point of view: storage is
/// best-effort, and implementations log their own I/O problems.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// All keys, in insertion order.
    fn keys(&self) -> Vec<String>;
}

/// In-memory store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<IndexMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled with `entries`, in order.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .expect("store lock poisoned")
            .shift_remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}
