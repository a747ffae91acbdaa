//! Backend services.

pub mod clipboard;
pub mod history;
pub mod monitor;
pub mod notifier;
pub mod storage;
pub mod theme;

pub use clipboard::{copy_entry, ClipboardAccess, MemoryClipboard, SystemClipboard};
pub use history::HistoryStore;
pub use monitor::ClipboardMonitor;
pub use notifier::Subscription;
pub use storage::SqliteStorage;
pub use theme::Theme;
