//! TUI screens.

pub mod history;

pub use history::HistoryScreen;

use async_trait::async_trait;
use crossterm::event::KeyEvent;
use ratatui::layout::Rect;
use ratatui::Frame;

/// Action returned by screen key handlers.
#[derive(Debug, PartialEq, Eq)]
pub enum ScreenAction {
    /// No action needed.
    None,
    /// Display a status message.
    StatusMessage(String),
    /// Leave the application.
    Quit,
}

/// Trait for screen implementations.
#[async_trait]
pub trait Screen {
    /// Draw the screen.
    fn draw(&mut self, f: &mut Frame, area: Rect);

    /// Handle a key event.
    async fn handle_key(&mut self, key: KeyEvent) -> ScreenAction;

    /// Key hints for the status bar, as (key, label) pairs.
    fn key_hints(&self) -> &'static [(&'static str, &'static str)];
}
