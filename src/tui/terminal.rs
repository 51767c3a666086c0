//! Minimal ratatui/crossterm renderer: one table of alive agents, one of
//! recent alerts. No navigation, no filtering — the interactive depth the
//! teacher's TUI has is out of scope here.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::widgets::{Block, Borders, Cell, Row, Table};
use ratatui::Terminal;

use crate::store::Store;

use super::Renderer;

pub struct TerminalRenderer {
    terminal: Option<Terminal<CrosstermBackend<io::Stdout>>>,
    quit_requested: bool,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self {
            terminal: None,
            quit_requested: false,
        }
    }
}

impl Renderer for TerminalRenderer {
    fn init(&mut self) {
        if enable_raw_mode().is_err() {
            return;
        }
        let mut stdout = io::stdout();
        if execute!(stdout, EnterAlternateScreen).is_err() {
            return;
        }
        let backend = CrosstermBackend::new(stdout);
        self.terminal = Terminal::new(backend).ok();
    }

    fn poll(&mut self, timeout: Duration) {
        if let Ok(true) = event::poll(timeout) {
            if let Ok(Event::Key(key)) = event::read() {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    self.quit_requested = true;
                }
            }
        }
    }

    fn draw(&mut self, store: &Store) {
        let Some(terminal) = self.terminal.as_mut() else {
            return;
        };
        let agents = store.reader().get_alive_agents().unwrap_or_default();
        let alerts = store.reader().get_recent_alerts(20).unwrap_or_default();

        let _ = terminal.draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(frame.area());

            let agent_rows: Vec<Row> = agents
                .iter()
                .map(|a| {
                    Row::new(vec![
                        Cell::from(a.pid.to_string()),
                        Cell::from(a.comm.clone()),
                        Cell::from(a.last_seen.to_string()),
                    ])
                })
                .collect();
            let agent_table = Table::new(
                agent_rows,
                [
                    Constraint::Length(8),
                    Constraint::Length(20),
                    Constraint::Length(12),
                ],
            )
            .header(Row::new(vec!["PID", "COMM", "LAST SEEN"]))
            .block(Block::default().borders(Borders::ALL).title("agents"));
            frame.render_widget(agent_table, chunks[0]);

            let alert_rows: Vec<Row> = alerts
                .iter()
                .map(|a| {
                    Row::new(vec![
                        Cell::from(a.pid.to_string()),
                        Cell::from(a.severity.as_str()),
                        Cell::from(a.category.clone()),
                        Cell::from(a.message.clone()),
                    ])
                })
                .collect();
            let alert_table = Table::new(
                alert_rows,
                [
                    Constraint::Length(8),
                    Constraint::Length(10),
                    Constraint::Length(18),
                    Constraint::Min(20),
                ],
            )
            .header(Row::new(vec!["PID", "SEVERITY", "CATEGORY", "MESSAGE"]))
            .block(Block::default().borders(Borders::ALL).title("alerts"));
            frame.render_widget(alert_table, chunks[1]);
        });
    }

    fn shutdown(&mut self) {
        if self.terminal.is_some() {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }

    fn wants_quit(&self) -> bool {
        self.quit_requested
    }
}
