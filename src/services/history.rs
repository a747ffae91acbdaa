//! History store - the ordered, deduplicated list of copied text.

use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{filter_indices, HistoryEntry};

use super::notifier::ChangeNotifier;
use super::storage::{Storage, StorageError};

/// Storage key holding the serialized history.
pub const HISTORY_KEY: &str = "clipboardHistory";

/// Errors returned to callers of the store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("index {index} is out of range for a history of {len} entries")]
    OutOfRange { index: usize, len: usize },
}

/// Clipboard history shared by the monitor and the UI.
///
/// Index 0 is the most recent entry. Every operation takes the same lock.
/// Mutations are applied inside a storage transaction to the history as
/// stored, not to the cached copy, so another process sharing the database
/// (a one-shot `delete` while the browser runs) never has its change
/// overwritten by a stale cache.
pub struct HistoryStore {
    entries: Mutex<Vec<HistoryEntry>>,
    storage: Box<dyn Storage>,
    notifier: ChangeNotifier,
}

impl HistoryStore {
    /// Load the history from `storage`, starting empty if nothing usable is
    /// stored there.
    pub fn open(storage: impl Storage + 'static) -> Self {
        let entries = load_entries(&storage);
        debug!(count = entries.len(), "Loaded clipboard history");
        Self {
            entries: Mutex::new(entries),
            storage: Box::new(storage),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Change signal fired after every mutation.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Put `text` at the front, removing any earlier copy of it.
    ///
    /// Empty text is ignored. Returns whether the history was touched.
    pub fn insert_or_promote(&self, text: &str) -> bool {
        let Some(entry) = HistoryEntry::new(text) else {
            return false;
        };

        self.mutate(|entries| {
            if let Some(existing) = entries.iter().position(|e| *e == entry) {
                entries.remove(existing);
            }
            entries.insert(0, entry);
            (true, true)
        })
    }

    /// Remove and return the entry at `index`.
    pub fn delete_at(&self, index: usize) -> Result<HistoryEntry, HistoryError> {
        self.mutate(|entries| {
            if index >= entries.len() {
                let err = HistoryError::OutOfRange {
                    index,
                    len: entries.len(),
                };
                return (Err(err), false);
            }
            (Ok(entries.remove(index)), true)
        })
    }

    /// Remove the entry whose text is exactly `text`, wherever it sits now.
    pub fn remove(&self, text: &str) -> bool {
        self.mutate(|entries| match entries.iter().position(|e| e.text() == text) {
            Some(position) => {
                entries.remove(position);
                (true, true)
            }
            None => (false, false),
        })
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.mutate(|entries| {
            entries.clear();
            ((), true)
        })
    }

    /// Pick up changes other processes made to the stored history.
    ///
    /// Publishes only if the stored history differs from the cached one.
    pub fn reload(&self) -> bool {
        let stored = match self.storage.get(HISTORY_KEY) {
            Ok(Some(raw)) => decode_entries(&raw),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read clipboard history: {}", e);
                None
            }
        };
        let Some(stored) = stored else {
            return false;
        };

        let mut entries = self.lock();
        if *entries == stored {
            return false;
        }
        debug!(count = stored.len(), "Clipboard history changed in storage");
        *entries = stored;
        self.notifier.publish();
        true
    }

    /// Copy of the current history.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.lock().clone()
    }

    /// Entry at `index`, if there is one.
    pub fn get(&self, index: usize) -> Option<HistoryEntry> {
        self.lock().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Entries containing `query`, ignoring case, most recent first, each
    /// with its index in the full history.
    pub fn search(&self, query: &str) -> Vec<(usize, HistoryEntry)> {
        let entries = self.lock();
        filter_indices(&entries, query)
            .into_iter()
            .map(|i| (i, entries[i].clone()))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `op` to the stored history inside one storage transaction and
    /// refresh the cache from the result.
    ///
    /// `op` returns its result and whether it changed anything; unchanged
    /// histories are not written, and are published only if the cache had
    /// fallen behind storage. If storage is unusable the operation still runs
    /// against the cached history.
    fn mutate<R>(&self, op: impl FnOnce(&mut Vec<HistoryEntry>) -> (R, bool)) -> R {
        let mut entries = self.lock();
        let mut op = Some(op);
        let mut outcome: Option<(R, bool)> = None;
        let mut stale = false;

        let mut apply = |stored: Option<String>| -> Result<Option<String>, StorageError> {
            let Some(op) = op.take() else {
                return Ok(None);
            };
            let mut current = stored
                .as_deref()
                .and_then(decode_entries)
                .unwrap_or_else(|| entries.clone());
            stale = current != *entries;
            let (value, changed) = op(&mut current);
            *entries = current;
            outcome = Some((value, changed));
            if !changed {
                return Ok(None);
            }
            Ok(Some(serde_json::to_string(&*entries)?))
        };
        let result = self.storage.update(HISTORY_KEY, &mut apply);

        if let Err(e) = result {
            warn!("Failed to persist clipboard history: {}", e);
        }

        let (value, changed) = match (outcome, op) {
            (Some(outcome), _) => outcome,
            // Storage failed before handing us the stored value.
            (None, Some(op)) => op(&mut *entries),
            (None, None) => unreachable!("operation consumed without an outcome"),
        };
        if changed || stale {
            self.notifier.publish();
        }
        value
    }
}

/// Decode a stored history, dropping blanks and repeats (first one wins).
/// `None` if the value is not a JSON array of strings.
fn decode_entries(raw: &str) -> Option<Vec<HistoryEntry>> {
    let texts: Vec<String> = match serde_json::from_str(raw) {
        Ok(texts) => texts,
        Err(e) => {
            warn!("Ignoring malformed clipboard history: {}", e);
            return None;
        }
    };

    let mut entries: Vec<HistoryEntry> = Vec::with_capacity(texts.len());
    for entry in texts.into_iter().filter_map(HistoryEntry::new) {
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    Some(entries)
}

/// Read the stored history, treating anything unusable as empty.
fn load_entries(storage: &dyn Storage) -> Vec<HistoryEntry> {
    match storage.get(HISTORY_KEY) {
        Ok(Some(raw)) => decode_entries(&raw).unwrap_or_default(),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Failed to read clipboard history: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::{MemoryStorage, SqliteStorage};
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn texts(store: &HistoryStore) -> Vec<String> {
        store.snapshot().into_iter().map(String::from).collect()
    }

    fn store() -> HistoryStore {
        HistoryStore::open(MemoryStorage::new())
    }

    #[test]
    fn promotion_is_idempotent() {
        let store = store();
        store.insert_or_promote("x");
        store.insert_or_promote("y");
        store.insert_or_promote("y");
        assert_eq!(texts(&store), vec!["y", "x"]);
    }

    #[test]
    fn reinsert_moves_entry_to_front() {
        let store = store();
        store.insert_or_promote("A");
        store.insert_or_promote("B");
        store.insert_or_promote("A");
        assert_eq!(texts(&store), vec!["A", "B"]);
    }

    #[test]
    fn history_never_holds_duplicates() {
        let store = store();
        for text in ["a", "b", "a", "c", "b", "b", "d", "a", "c"] {
            store.insert_or_promote(text);
        }
        let all = texts(&store);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), unique.len());
        assert_eq!(all, vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn empty_text_is_ignored() {
        let store = store();
        store.insert_or_promote("a");
        store.insert_or_promote("b");
        let mut sub = store.notifier().subscribe();

        assert!(!store.insert_or_promote(""));
        assert_eq!(texts(&store), vec!["b", "a"]);
        assert!(!sub.take());
    }

    #[test]
    fn search_filters_without_reordering() {
        let store = store();
        for text in ["baz", "BarFoo", "foobar"] {
            store.insert_or_promote(text);
        }
        let found: Vec<(usize, String)> = store
            .search("Foo")
            .into_iter()
            .map(|(i, entry)| (i, String::from(entry)))
            .collect();
        assert_eq!(
            found,
            vec![(0, "foobar".to_string()), (1, "BarFoo".to_string())]
        );
        assert_eq!(store.search("").len(), 3);
        assert!(store.search("qux").is_empty());
    }

    #[test]
    fn delete_out_of_range_leaves_history_alone() {
        let store = store();
        for text in ["c", "b", "a"] {
            store.insert_or_promote(text);
        }
        let mut sub = store.notifier().subscribe();

        assert_eq!(
            store.delete_at(5),
            Err(HistoryError::OutOfRange { index: 5, len: 3 })
        );
        assert_eq!(texts(&store), vec!["a", "b", "c"]);
        assert!(!sub.take());
    }

    #[test]
    fn delete_at_removes_that_entry() {
        let store = store();
        for text in ["c", "b", "a"] {
            store.insert_or_promote(text);
        }
        assert_eq!(store.delete_at(1).unwrap().text(), "b");
        assert_eq!(texts(&store), vec!["a", "c"]);
    }

    #[test]
    fn remove_by_text() {
        let store = store();
        store.insert_or_promote("keep");
        store.insert_or_promote("drop");
        assert!(store.remove("drop"));
        assert!(!store.remove("drop"));
        assert_eq!(texts(&store), vec!["keep"]);
    }

    #[test]
    fn mutations_publish() {
        let store = store();
        let mut sub = store.notifier().subscribe();

        store.insert_or_promote("a");
        assert!(sub.take());
        store.delete_at(0).unwrap();
        assert!(sub.take());
        store.clear();
        assert!(sub.take());
    }

    #[test]
    fn snapshot_is_detached() {
        let store = store();
        store.insert_or_promote("a");
        let snapshot = store.snapshot();
        store.insert_or_promote("b");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn history_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");

        {
            let store = HistoryStore::open(SqliteStorage::open(&path).unwrap());
            for text in ["c", "b", "a"] {
                store.insert_or_promote(text);
            }
        }

        let reloaded = HistoryStore::open(SqliteStorage::open(&path).unwrap());
        assert_eq!(texts(&reloaded), vec!["a", "b", "c"]);
    }

    #[test]
    fn clear_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");

        {
            let store = HistoryStore::open(SqliteStorage::open(&path).unwrap());
            store.insert_or_promote("a");
            store.clear();
        }

        let reloaded = HistoryStore::open(SqliteStorage::open(&path).unwrap());
        assert!(reloaded.is_empty());
    }

    #[test]
    fn malformed_storage_loads_empty() {
        let storage = MemoryStorage::new();
        storage.set(HISTORY_KEY, "{not json").unwrap();
        assert!(HistoryStore::open(storage).is_empty());

        let storage = MemoryStorage::new();
        storage.set(HISTORY_KEY, r#"{"a": 1}"#).unwrap();
        assert!(HistoryStore::open(storage).is_empty());
    }

    #[test]
    fn loading_drops_blanks_and_repeats() {
        let storage = MemoryStorage::new();
        storage
            .set(HISTORY_KEY, r#"["a", "", "b", "a"]"#)
            .unwrap();
        let store = HistoryStore::open(storage);
        assert_eq!(texts(&store), vec!["a", "b"]);
    }

    #[test]
    fn every_mutation_is_written_through() {
        let storage = Arc::new(MemoryStorage::new());
        let store = HistoryStore::open(storage.clone());

        store.insert_or_promote("a");
        store.insert_or_promote("b");
        assert_eq!(storage.get(HISTORY_KEY).unwrap().as_deref(), Some(r#"["b","a"]"#));

        store.delete_at(1).unwrap();
        assert_eq!(storage.get(HISTORY_KEY).unwrap().as_deref(), Some(r#"["b"]"#));

        store.clear();
        assert_eq!(storage.get(HISTORY_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn concurrent_inserts_keep_invariants() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.insert_or_promote(&format!("item-{}", (i + worker) % 20));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let all = texts(&store);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), unique.len());
        assert_eq!(all.len(), 20);
    }

    #[test]
    fn delete_from_another_process_is_not_undone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");

        let running = HistoryStore::open(SqliteStorage::open(&path).unwrap());
        running.insert_or_promote("secret");
        running.insert_or_promote("b");

        let cli = HistoryStore::open(SqliteStorage::open(&path).unwrap());
        assert_eq!(cli.delete_at(1).unwrap().text(), "secret");

        running.insert_or_promote("c");
        assert_eq!(texts(&running), vec!["c", "b"]);

        let reloaded = HistoryStore::open(SqliteStorage::open(&path).unwrap());
        assert_eq!(texts(&reloaded), vec!["c", "b"]);
    }

    #[test]
    fn delete_index_refers_to_stored_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");

        let running = HistoryStore::open(SqliteStorage::open(&path).unwrap());
        running.insert_or_promote("a");

        let cli = HistoryStore::open(SqliteStorage::open(&path).unwrap());
        cli.clear();

        assert_eq!(
            running.delete_at(0),
            Err(HistoryError::OutOfRange { index: 0, len: 0 })
        );
        assert!(running.is_empty());
    }

    #[test]
    fn reload_picks_up_clear_from_another_process() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");

        let running = HistoryStore::open(SqliteStorage::open(&path).unwrap());
        running.insert_or_promote("a");
        running.insert_or_promote("b");
        let mut sub = running.notifier().subscribe();

        assert!(!running.reload());
        assert!(!sub.take());

        let cli = HistoryStore::open(SqliteStorage::open(&path).unwrap());
        cli.clear();

        assert!(running.reload());
        assert!(running.is_empty());
        assert!(sub.take());
    }

    #[test]
    fn stale_cache_is_published_even_without_a_change() {
        let storage = Arc::new(MemoryStorage::new());
        let store = HistoryStore::open(storage.clone());
        store.insert_or_promote("a");
        storage.set(HISTORY_KEY, r#"["x","a"]"#).unwrap();
        let mut sub = store.notifier().subscribe();

        assert!(!store.remove("missing"));
        assert_eq!(texts(&store), vec!["x", "a"]);
        assert!(sub.take());
    }
}
