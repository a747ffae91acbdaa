//! Clipboard history entry.

use serde::{Deserialize, Serialize};

/// A single piece of copied text.
///
/// Entries are never empty; the only way to build one is through
/// [`HistoryEntry::new`], which rejects empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HistoryEntry(String);

impl HistoryEntry {
    /// Wrap `text` as an entry, or `None` if it is empty.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    /// The full stored text.
    pub fn text(&self) -> &str {
        &self.0
    }

    /// Number of characters (not bytes).
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    /// Number of lines, counting a trailing partial line.
    pub fn line_count(&self) -> usize {
        self.0.lines().count().max(1)
    }

    /// Single-line rendering for list rows.
    ///
    /// Control characters become spaces and the result is cut to `width`
    /// characters, with `...` appended when anything was dropped.
    pub fn display_line(&self, width: usize) -> String {
        let sanitized: String = self
            .0
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        let sanitized = sanitized.trim();

        if sanitized.chars().count() > width {
            let cut: String = sanitized.chars().take(width).collect();
            format!("{}...", cut.trim_end())
        } else {
            sanitized.to_string()
        }
    }

    /// Case-insensitive substring match against an already lowercased query.
    fn matches_lowercase(&self, query_lower: &str) -> bool {
        self.0.to_lowercase().contains(query_lower)
    }
}

impl TryFrom<String> for HistoryEntry {
    type Error = &'static str;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new(text).ok_or("history entry cannot be empty")
    }
}

impl From<HistoryEntry> for String {
    fn from(entry: HistoryEntry) -> Self {
        entry.0
    }
}

impl AsRef<str> for HistoryEntry {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Indices of the entries whose text contains `query`, ignoring case.
///
/// Order is preserved. An empty query matches everything.
pub fn filter_indices(entries: &[HistoryEntry], query: &str) -> Vec<usize> {
    if query.is_empty() {
        return (0..entries.len()).collect();
    }
    let query_lower = query.to_lowercase();
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.matches_lowercase(&query_lower))
        .map(|(i, _)| i)
        .collect()
}
