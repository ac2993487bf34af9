//! Terminal UI rendering.

pub mod header;
pub mod input;
pub mod status_bar;
pub mod task_list;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::app::{App, Modal};
use crate::store::TaskStore;

/// Main draw function for the entire UI.
pub fn draw(frame: &mut Frame, app: &App, store: &TaskStore) {
    let mut constraints = vec![
        Constraint::Length(2), // Header
        Constraint::Length(3), // Input
        Constraint::Length(1), // Filter tabs
        Constraint::Min(3),    // Task list
        Constraint::Length(1), // Status bar
    ];
    if app.setup_hint {
        constraints.insert(1, Constraint::Length(4));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    let mut index = 0;
    header::render(frame, chunks[index], store);
    index += 1;

    if app.setup_hint {
        render_setup_hint(frame, chunks[index]);
        index += 1;
    }

    input::render(frame, chunks[index], app);
    index += 1;
    task_list::render_tabs(frame, chunks[index], app);
    index += 1;
    task_list::render(frame, chunks[index], app, store);
    index += 1;
    status_bar::render(frame, chunks[index], app);

    if let Some(modal) = &app.modal {
        render_modal(frame, modal);
    }
}

/// Explain how to get the sync server going when none could be reached for
/// setup reasons.
fn render_setup_hint(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(Span::styled("Sync server not available", theme::bold())),
        Line::from(Span::styled(
            "1. Start one with: taskflow-sync --bind 127.0.0.1:7878",
            theme::dimmed(),
        )),
        Line::from(Span::styled(
            "2. Point this client at it: --server-url ws://127.0.0.1:7878/ws",
            theme::dimmed(),
        )),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(ratatui::style::Style::default().fg(theme::WARNING));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Render the active modal centered over the rest of the UI.
fn render_modal(frame: &mut Frame, modal: &Modal) {
    let (title, body, border_color) = match modal {
        Modal::Alert { title, message } => (
            title.as_str(),
            format!("{message}\n\nPress any key to dismiss."),
            theme::ERROR,
        ),
        Modal::ConfirmClear => (
            "Clear all tasks?",
            "This erases every task and the local snapshot.\n\nPress y to confirm, any other key to cancel.".to_string(),
            theme::WARNING,
        ),
    };

    let area = centered_rect(60, 30, frame.area());
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(Span::styled(title, theme::bold()))
        .borders(Borders::ALL)
        .border_style(ratatui::style::Style::default().fg(border_color));
    let paragraph = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(block);
    frame.render_widget(paragraph, area);
}

/// A rect centered in `area`, sized as percentages of it.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
