//! Header rendering: title and task counts.

use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::store::TaskStore;

/// Render the header: app title plus total / done / left counts.
pub fn render(frame: &mut Frame, area: Rect, store: &TaskStore) {
    let total = store.len();
    let done = store.completed_count();
    let left = total - done;

    let title = Line::from(Span::styled("TaskFlow", theme::bold()));
    let counts = Line::from(vec![
        Span::styled(format!("{total}"), theme::bold()),
        Span::styled(" total", theme::dimmed()),
        Span::raw("  "),
        Span::styled(format!("{done}"), Style::default().fg(theme::SUCCESS)),
        Span::styled(" done", theme::dimmed()),
        Span::raw("  "),
        Span::styled(format!("{left}"), Style::default().fg(theme::WARNING)),
        Span::styled(" left", theme::dimmed()),
    ]);

    let paragraph = Paragraph::new(vec![title, counts]).centered();
    frame.render_widget(paragraph, area);
}
