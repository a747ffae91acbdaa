//! Main application state and event loop.

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::screens::{HistoryScreen, Screen, ScreenAction};
use crate::services::{ClipboardAccess, ClipboardMonitor, HistoryStore, Theme};

/// Application state.
pub struct App {
    should_quit: bool,
    monitor: Arc<ClipboardMonitor>,
    theme: Arc<Theme>,

    // Screens
    history_screen: HistoryScreen,

    // Status bar info
    status_message: String,
}

impl App {
    /// Create a new application instance.
    pub fn new(
        config: Config,
        store: Arc<HistoryStore>,
        clipboard: Arc<dyn ClipboardAccess>,
        monitor: Arc<ClipboardMonitor>,
        theme: Arc<Theme>,
    ) -> Self {
        let config = Arc::new(config);

        let history_screen = HistoryScreen::new(store, clipboard, config, theme.clone());
        let status_message = format!("{} entries loaded", history_screen.entry_count());

        Self {
            should_quit: false,
            monitor,
            theme,
            history_screen,
            status_message,
        }
    }

    /// Run the application.
    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            EnableFocusChange
        )?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Main event loop
        let result = self.event_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            DisableFocusChange,
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    /// Main event loop.
    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        loop {
            // Pick up history changes published by the monitor
            if self.history_screen.poll_changes() {
                self.status_message =
                    format!("{} entries", self.history_screen.entry_count());
            }

            // Draw UI
            terminal.draw(|f| self.draw(f))?;

            // Poll for events with timeout
            if event::poll(Duration::from_millis(100))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match (key.modifiers, key.code) {
                            (KeyModifiers::CONTROL, KeyCode::Char('c'))
                            | (KeyModifiers::CONTROL, KeyCode::Char('q')) => {
                                self.should_quit = true;
                            }
                            _ => match self.history_screen.handle_key(key).await {
                                ScreenAction::None => {}
                                ScreenAction::StatusMessage(msg) => self.status_message = msg,
                                ScreenAction::Quit => self.should_quit = true,
                            },
                        }
                    }
                    Event::FocusGained => {
                        // Coming back to the terminal counts as the app
                        // becoming active: check right away instead of
                        // waiting for the next poll.
                        if self.monitor.check() {
                            debug!("Clipboard change picked up on focus");
                        }
                    }
                    _ => {}
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Draw the UI.
    fn draw(&mut self, f: &mut ratatui::Frame) {
        use ratatui::layout::{Constraint, Direction, Layout};
        use ratatui::style::{Modifier, Style};
        use ratatui::text::{Line, Span};
        use ratatui::widgets::{Block, Borders, Paragraph};

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title bar
                Constraint::Min(0),    // Main content
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        let title = Paragraph::new(Line::from(vec![
            Span::styled(
                " 📋 clipkeep",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  clipboard history", Style::default().fg(self.theme.muted)),
        ]))
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        // Main content area
        self.history_screen.draw(f, chunks[1]);

        // Status bar
        let mut spans = vec![
            Span::raw(" "),
            Span::styled(
                &self.status_message,
                Style::default().fg(self.theme.foreground),
            ),
        ];
        for (key, label) in self.history_screen.key_hints() {
            spans.push(Span::raw(" │ "));
            spans.push(Span::styled(*key, Style::default().fg(self.theme.accent)));
            spans.push(Span::styled(*label, Style::default().fg(self.theme.muted)));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), chunks[2]);
    }
}
