//! History screen - search, preview, copy and prune clipboard history.

use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use ratatui_garnish::{shadow::HalfShadow, GarnishableStatefulWidget, GarnishableWidget, Padding};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::models::{filter_indices, HistoryEntry};
use crate::services::{ClipboardAccess, HistoryStore, Subscription, Theme};

use super::{Screen, ScreenAction};

/// What keystrokes currently mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Keys are commands.
    Normal,
    /// Keys edit the search query.
    Search,
    /// Waiting for the user to confirm clearing everything.
    ConfirmClear,
}

const NORMAL_HINTS: &[(&str, &str)] = &[
    ("j/k", " Nav"),
    ("/", " Search"),
    ("Enter", " Copy"),
    ("d", " Delete"),
    ("c", " Clear"),
    ("q", " Quit"),
];

const SEARCH_HINTS: &[(&str, &str)] = &[
    ("↑/↓", " Nav"),
    ("Enter", " Done"),
    ("Esc", " Cancel"),
];

const CONFIRM_HINTS: &[(&str, &str)] = &[("y", " Clear all"), ("n", " Keep")];

/// Window-style view over the clipboard history.
pub struct HistoryScreen {
    store: Arc<HistoryStore>,
    clipboard: Arc<dyn ClipboardAccess>,
    changes: Subscription,
    config: Arc<Config>,
    theme: Arc<Theme>,

    // UI state
    mode: Mode,
    query: String,
    list_state: ListState,

    // Cached data
    entries: Vec<HistoryEntry>,
    /// Indices into `entries` that match `query`
    visible: Vec<usize>,
}

impl HistoryScreen {
    /// Create a new history screen.
    pub fn new(
        store: Arc<HistoryStore>,
        clipboard: Arc<dyn ClipboardAccess>,
        config: Arc<Config>,
        theme: Arc<Theme>,
    ) -> Self {
        let changes = store.notifier().subscribe();
        let mut screen = Self {
            store,
            clipboard,
            changes,
            config,
            theme,
            mode: Mode::Normal,
            query: String::new(),
            list_state: ListState::default(),
            entries: Vec::new(),
            visible: Vec::new(),
        };
        screen.refresh();
        screen
    }

    /// Re-read the history if it changed since the last call.
    pub fn poll_changes(&mut self) -> bool {
        if self.changes.take() {
            self.refresh();
            true
        } else {
            false
        }
    }

    /// Number of entries in the full history.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Rebuild the cached snapshot and filter, keeping the selection on the
    /// same text when it is still visible.
    fn refresh(&mut self) {
        let selected_text = self.selected_entry().map(|e| e.text().to_string());

        // Mark pending changes seen before reading, so a publish that lands
        // after the snapshot is still reported by the next poll.
        self.changes.take();
        self.entries = self.store.snapshot();
        self.apply_filter();

        let position = selected_text.and_then(|text| {
            self.visible
                .iter()
                .position(|&i| self.entries[i].text() == text)
        });
        match position {
            Some(position) => self.list_state.select(Some(position)),
            None => self.clamp_selection(),
        }
    }

    fn apply_filter(&mut self) {
        self.visible = filter_indices(&self.entries, &self.query);
    }

    fn clamp_selection(&mut self) {
        let selected = if self.visible.is_empty() {
            None
        } else {
            let current = self.list_state.selected().unwrap_or(0);
            Some(current.min(self.visible.len() - 1))
        };
        self.list_state.select(selected);
    }

    /// Get currently selected entry.
    fn selected_entry(&self) -> Option<&HistoryEntry> {
        self.list_state
            .selected()
            .and_then(|i| self.visible.get(i))
            .and_then(|&i| self.entries.get(i))
    }

    /// Navigate up, wrapping to the bottom.
    fn move_up(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            let new_index = if selected == 0 {
                self.visible.len().saturating_sub(1)
            } else {
                selected - 1
            };
            self.list_state.select(Some(new_index));
        }
    }

    /// Navigate down, wrapping to the top.
    fn move_down(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            let new_index = if selected >= self.visible.len().saturating_sub(1) {
                0
            } else {
                selected + 1
            };
            self.list_state.select(Some(new_index));
        }
    }

    fn set_query(&mut self, query: String) {
        self.query = query;
        self.apply_filter();
        self.list_state
            .select(if self.visible.is_empty() { None } else { Some(0) });
    }

    fn copy_selected(&mut self) -> ScreenAction {
        let Some(entry) = self.selected_entry().cloned() else {
            return ScreenAction::None;
        };
        match self.clipboard.set_text(entry.text()) {
            Ok(()) => {
                info!(chars = entry.char_count(), "Copied history entry");
                ScreenAction::StatusMessage(format!("Copied: {}", entry.display_line(40)))
            }
            Err(e) => ScreenAction::StatusMessage(format!("Copy failed: {}", e)),
        }
    }

    fn delete_selected(&mut self) -> ScreenAction {
        let Some(entry) = self.selected_entry().cloned() else {
            return ScreenAction::None;
        };
        // By text rather than index: the monitor may have shifted indices
        // since the last refresh.
        let removed = self.store.remove(entry.text());
        self.refresh();
        if removed {
            ScreenAction::StatusMessage(format!("Deleted: {}", entry.display_line(40)))
        } else {
            ScreenAction::None
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> ScreenAction {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_up();
                ScreenAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_down();
                ScreenAction::None
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Search;
                ScreenAction::None
            }
            KeyCode::Enter | KeyCode::Char('y') => self.copy_selected(),
            KeyCode::Char('d') | KeyCode::Delete => self.delete_selected(),
            KeyCode::Char('c') => {
                if self.entries.is_empty() {
                    ScreenAction::StatusMessage("History is already empty".to_string())
                } else {
                    self.mode = Mode::ConfirmClear;
                    ScreenAction::None
                }
            }
            KeyCode::Esc => {
                if !self.query.is_empty() {
                    self.set_query(String::new());
                }
                ScreenAction::None
            }
            KeyCode::Char('q') => ScreenAction::Quit,
            _ => ScreenAction::None,
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> ScreenAction {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.set_query(String::new());
            }
            KeyCode::Enter => self.mode = Mode::Normal,
            KeyCode::Backspace => {
                let mut query = self.query.clone();
                query.pop();
                self.set_query(query);
            }
            KeyCode::Up => self.move_up(),
            KeyCode::Down => self.move_down(),
            KeyCode::Char(c) => {
                let mut query = self.query.clone();
                query.push(c);
                self.set_query(query);
            }
            _ => {}
        }
        ScreenAction::None
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> ScreenAction {
        self.mode = Mode::Normal;
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                let count = self.entries.len();
                self.store.clear();
                self.refresh();
                info!(count, "Cleared clipboard history");
                ScreenAction::StatusMessage(format!("Cleared {} entries", count))
            }
            _ => ScreenAction::StatusMessage("Clear cancelled".to_string()),
        }
    }

    fn draw_search_bar(&self, f: &mut Frame, area: Rect) {
        let searching = self.mode == Mode::Search;
        let text = if self.query.is_empty() && !searching {
            Span::styled("press / to search", Style::default().fg(self.theme.muted))
        } else {
            Span::styled(&self.query, Style::default().fg(self.theme.foreground))
        };
        let mut spans = vec![Span::styled("🔍 ", Style::default().fg(self.theme.muted)), text];
        if searching {
            spans.push(Span::styled("▏", Style::default().fg(self.theme.accent)));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .title("Search")
            .border_style(if searching {
                Style::default().fg(self.theme.accent)
            } else {
                Style::default().fg(self.theme.muted)
            });
        f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn draw_list(&mut self, f: &mut Frame, area: Rect) {
        let width = self.config.display.item_width;
        let items: Vec<ListItem> = self
            .visible
            .iter()
            .map(|&i| {
                let entry = &self.entries[i];
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:>3} ", i), Style::default().fg(self.theme.muted)),
                    Span::styled(
                        entry.display_line(width),
                        Style::default().fg(self.theme.foreground),
                    ),
                ]))
            })
            .collect();

        let title = if self.query.is_empty() {
            format!("History ({})", self.entries.len())
        } else {
            format!("History ({} of {})", self.visible.len(), self.entries.len())
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(self.theme.accent));

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .bg(self.theme.muted)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("► ");

        let garnished = GarnishableStatefulWidget::garnish(list, HalfShadow::default());
        f.render_stateful_widget(garnished, area, &mut self.list_state);
    }

    fn draw_preview(&self, f: &mut Frame, area: Rect) {
        let (title, body) = match self.selected_entry() {
            Some(entry) => (
                format!(
                    "Preview - {} chars, {} lines",
                    entry.char_count(),
                    entry.line_count()
                ),
                entry.text().to_string(),
            ),
            None if self.entries.is_empty() => (
                "Preview".to_string(),
                "No clipboard history yet\n\nCopy some text and it will show up here".to_string(),
            ),
            None => ("Preview".to_string(), "No selection".to_string()),
        };

        let mut preview = Paragraph::new(body)
            .block(Block::default().borders(Borders::ALL).title(title))
            .style(Style::default().fg(self.theme.preview));
        if self.config.display.preview_wrap {
            preview = preview.wrap(Wrap { trim: false });
        }

        let garnished = preview
            .garnish(Padding::horizontal(1))
            .garnish(HalfShadow::default());
        f.render_widget(garnished, area);
    }

    fn draw_confirm(&self, f: &mut Frame, area: Rect) {
        let popup = centered(area, 48, 7);
        let text = vec![
            Line::from(""),
            Line::from(format!(
                "Clear all {} clipboard entries?",
                self.entries.len()
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("y", Style::default().fg(self.theme.danger).add_modifier(Modifier::BOLD)),
                Span::raw(" clear   "),
                Span::styled("n", Style::default().fg(self.theme.success).add_modifier(Modifier::BOLD)),
                Span::raw(" keep"),
            ]),
        ];
        let dialog = Paragraph::new(text)
            .alignment(ratatui::layout::Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Clear History")
                    .border_style(Style::default().fg(self.theme.danger)),
            );
        f.render_widget(Clear, popup);
        f.render_widget(dialog, popup);
    }
}

/// A `width` x `height` rectangle centered in `area`, clipped to fit.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[async_trait]
impl Screen for HistoryScreen {
    fn draw(&mut self, f: &mut Frame, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Search bar
                Constraint::Min(0),    // List + preview
            ])
            .split(area);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(45), // History list
                Constraint::Percentage(55), // Preview
            ])
            .split(rows[1]);

        self.draw_search_bar(f, rows[0]);
        self.draw_list(f, columns[0]);
        self.draw_preview(f, columns[1]);

        if self.mode == Mode::ConfirmClear {
            self.draw_confirm(f, area);
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) -> ScreenAction {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Search => self.handle_search_key(key),
            Mode::ConfirmClear => self.handle_confirm_key(key),
        }
    }

    fn key_hints(&self) -> &'static [(&'static str, &'static str)] {
        match self.mode {
            Mode::Normal => NORMAL_HINTS,
            Mode::Search => SEARCH_HINTS,
            Mode::ConfirmClear => CONFIRM_HINTS,
        }
    }
}
