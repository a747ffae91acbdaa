//! Clipboard monitoring - feeds new clipboard text into the history.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use super::clipboard::ClipboardAccess;
use super::history::HistoryStore;

/// How often the clipboard is polled.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Watches a clipboard's change counter and records new text.
///
/// Checks can come from the polling task and from [`ClipboardMonitor::check`]
/// callers (e.g. when the UI regains focus) at the same time; the last seen
/// counter is swapped atomically so each change is acted on once.
pub struct ClipboardMonitor {
    clipboard: Arc<dyn ClipboardAccess>,
    store: Arc<HistoryStore>,
    last_change: AtomicU64,
}

impl ClipboardMonitor {
    pub fn new(clipboard: Arc<dyn ClipboardAccess>, store: Arc<HistoryStore>) -> Self {
        Self {
            clipboard,
            store,
            last_change: AtomicU64::new(0),
        }
    }

    /// Compare the change counter once and record any new text.
    ///
    /// Returns true if the history was updated. A change to non-text
    /// content is consumed without touching the history.
    pub fn check(&self) -> bool {
        let count = self.clipboard.change_count();
        if self.last_change.swap(count, Ordering::SeqCst) == count {
            return false;
        }

        match self.clipboard.current_text() {
            Some(text) => {
                debug!(change = count, chars = text.chars().count(), "Clipboard changed");
                self.store.insert_or_promote(&text)
            }
            None => {
                debug!(change = count, "Clipboard changed to non-text content");
                false
            }
        }
    }

    /// Poll every [`POLL_INTERVAL`] on a background task until the handle
    /// is dropped. Each tick also reloads the history so changes made by
    /// other processes sharing the database show up.
    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        let task = tokio::spawn(async move {
            let mut ticker = interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.store.reload();
                self.check();
            }
        });
        MonitorHandle { task }
    }
}

/// Running polling task; stops it when dropped.
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clipboard::MemoryClipboard;
    use crate::services::history::HISTORY_KEY;
    use crate::services::storage::{MemoryStorage, Storage};

    fn setup() -> (Arc<MemoryClipboard>, Arc<HistoryStore>, ClipboardMonitor) {
        let clipboard = Arc::new(MemoryClipboard::new());
        let store = Arc::new(HistoryStore::open(MemoryStorage::new()));
        let monitor = ClipboardMonitor::new(clipboard.clone(), store.clone());
        (clipboard, store, monitor)
    }

    fn texts(store: &HistoryStore) -> Vec<String> {
        store.snapshot().into_iter().map(String::from).collect()
    }

    #[test]
    fn unchanged_counter_is_a_no_op() {
        let (_clipboard, store, monitor) = setup();
        assert!(!monitor.check());
        assert!(store.is_empty());
    }

    #[test]
    fn change_is_recorded_once() {
        let (clipboard, store, monitor) = setup();
        clipboard.set_text("hello").unwrap();

        assert!(monitor.check());
        assert!(!monitor.check());
        assert_eq!(texts(&store), vec!["hello"]);
    }

    #[test]
    fn non_text_content_is_skipped() {
        let (clipboard, store, monitor) = setup();
        clipboard.set_non_text();
        assert!(!monitor.check());
        assert!(store.is_empty());

        clipboard.set_text("").unwrap();
        assert!(!monitor.check());
        assert!(store.is_empty());
    }

    #[test]
    fn recopy_promotes_existing_entry() {
        let (clipboard, store, monitor) = setup();
        for text in ["A", "B", "A"] {
            clipboard.set_text(text).unwrap();
            monitor.check();
        }
        assert_eq!(texts(&store), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_task_picks_up_changes() {
        let (clipboard, store, monitor) = setup();
        let handle = Arc::new(monitor).spawn();

        clipboard.set_text("first").unwrap();
        tokio::time::sleep(POLL_INTERVAL + Duration::from_millis(500)).await;
        assert_eq!(texts(&store), vec!["first"]);

        clipboard.set_non_text();
        tokio::time::sleep(POLL_INTERVAL).await;
        assert_eq!(texts(&store), vec!["first"]);

        clipboard.set_text("second").unwrap();
        tokio::time::sleep(POLL_INTERVAL).await;
        assert_eq!(texts(&store), vec!["second", "first"]);

        drop(handle);
        clipboard.set_text("after stop").unwrap();
        tokio::time::sleep(POLL_INTERVAL * 3).await;
        assert_eq!(texts(&store), vec!["second", "first"]);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_task_reloads_shared_history() {
        let clipboard = Arc::new(MemoryClipboard::new());
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(HistoryStore::open(storage.clone()));
        store.insert_or_promote("a");
        let mut sub = store.notifier().subscribe();
        let _handle = Arc::new(ClipboardMonitor::new(clipboard, store.clone())).spawn();

        storage.set(HISTORY_KEY, "[]").unwrap();
        tokio::time::sleep(POLL_INTERVAL + Duration::from_millis(500)).await;

        assert!(store.is_empty());
        assert!(sub.take());
    }
}
