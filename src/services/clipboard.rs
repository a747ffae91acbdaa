//! Clipboard operations.

use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::info;

use crate::models::HistoryEntry;

use super::history::{HistoryError, HistoryStore};

/// Errors from the system clipboard.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(arboard::Error),
    #[error("failed to write clipboard: {0}")]
    Write(arboard::Error),
}

/// Access to a clipboard that can report when its content changes.
pub trait ClipboardAccess: Send + Sync {
    /// Counter that moves whenever the clipboard content changes.
    fn change_count(&self) -> u64;

    /// Current text content, or `None` for empty or non-text content.
    fn current_text(&self) -> Option<String>;

    /// Replace the clipboard content with `text`.
    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// What happens to text this process writes once the write call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The process stays up and its clipboard handle keeps serving the
    /// text (browser, `watch`).
    Held,
    /// One-shot writer about to exit. On X11/Wayland the selection dies
    /// with its owner, so the write blocks until another application takes
    /// the clipboard over.
    HandOff,
}

impl Ownership {
    fn blocks_on_write(self) -> bool {
        self == Ownership::HandOff && cfg!(target_os = "linux")
    }
}

/// The OS clipboard, through arboard.
///
/// arboard exposes no change counter, so one is derived by fingerprinting
/// the text on every [`ClipboardAccess::change_count`] call. One handle is
/// kept for the lifetime of the value; on Linux that handle is what keeps
/// text we wrote available to other applications.
pub struct SystemClipboard {
    handle: Mutex<arboard::Clipboard>,
    tracker: Mutex<ChangeTracker>,
    ownership: Ownership,
}

impl SystemClipboard {
    /// Open the clipboard for a long-running session.
    pub fn connect() -> Result<Self, ClipboardError> {
        Self::open(Ownership::Held)
    }

    /// Open the clipboard for a single write before the process exits.
    pub fn connect_for_handoff() -> Result<Self, ClipboardError> {
        Self::open(Ownership::HandOff)
    }

    fn open(ownership: Ownership) -> Result<Self, ClipboardError> {
        let handle = arboard::Clipboard::new().map_err(ClipboardError::Unavailable)?;
        Ok(Self {
            handle: Mutex::new(handle),
            tracker: Mutex::new(ChangeTracker::default()),
            ownership,
        })
    }

    fn handle(&self) -> MutexGuard<'_, arboard::Clipboard> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_text(&self) -> Option<String> {
        self.handle().get_text().ok().filter(|t| !t.is_empty())
    }
}

impl ClipboardAccess for SystemClipboard {
    fn change_count(&self) -> u64 {
        let text = self.read_text();
        let mut tracker = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);
        tracker.observe(text.as_deref())
    }

    fn current_text(&self) -> Option<String> {
        self.read_text()
    }

    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = self.handle();
        let written = if self.ownership.blocks_on_write() {
            info!("Serving the clipboard until another application takes it over");
            write_and_wait(&mut *clipboard, text)
        } else {
            clipboard.set_text(text)
        };
        written.map_err(ClipboardError::Write)
    }
}

#[cfg(target_os = "linux")]
fn write_and_wait(clipboard: &mut arboard::Clipboard, text: &str) -> Result<(), arboard::Error> {
    use arboard::SetExtLinux;
    clipboard.set().wait().text(text)
}

#[cfg(not(target_os = "linux"))]
fn write_and_wait(clipboard: &mut arboard::Clipboard, text: &str) -> Result<(), arboard::Error> {
    clipboard.set_text(text)
}

/// Turns successive content observations into a change counter.
#[derive(Debug, Default)]
struct ChangeTracker {
    last: Option<u64>,
    count: u64,
}

impl ChangeTracker {
    fn observe(&mut self, text: Option<&str>) -> u64 {
        let fingerprint = text.map(|t| {
            let mut hasher = DefaultHasher::new();
            t.hash(&mut hasher);
            hasher.finish()
        });
        if fingerprint != self.last {
            self.last = fingerprint;
            self.count = self.count.wrapping_add(1);
        }
        self.count
    }
}

/// A clipboard that lives only inside this process.
///
/// Stands in for the system clipboard when none is reachable (headless
/// sessions), so history can still be browsed and managed.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    state: Mutex<(u64, Option<String>)>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate another application putting non-text data on the clipboard.
    #[cfg(test)]
    pub fn set_non_text(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.0 += 1;
        state.1 = None;
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn change_count(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    fn current_text(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .1
            .clone()
            .filter(|t| !t.is_empty())
    }

    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.0 += 1;
        state.1 = Some(text.to_string());
        Ok(())
    }
}

/// Put the history entry at `index` back on the clipboard.
pub fn copy_entry(
    store: &HistoryStore,
    clipboard: &dyn ClipboardAccess,
    index: usize,
) -> Result<HistoryEntry> {
    let entry = store.get(index).ok_or(HistoryError::OutOfRange {
        index,
        len: store.len(),
    })?;
    clipboard.set_text(entry.text())?;
    Ok(entry)
}
