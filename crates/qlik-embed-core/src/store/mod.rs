// ── Storage ──
//
// Persisted key-value state (redirect guard, cached tokens) and the
// reactive slot board holding the live display models.

mod collection;
mod file;
mod kv;

pub(crate) use collection::SlotBoard;
pub use file::FileStore;
pub use kv::{KeyValueStore, MemoryStore};
