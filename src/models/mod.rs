//! Data models for clipboard history.

pub mod entry;

pub use entry::{filter_indices, HistoryEntry};
