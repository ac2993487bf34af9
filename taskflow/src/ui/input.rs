//! Input box rendering.

use ratatui::{
    Frame,
    layout::{Position, Rect},
    text::Span,
    widgets::{Block, Borders, Paragraph},
};

use super::theme;
use crate::app::{App, PanelFocus};

/// Render the input box. The terminal cursor is placed inside it while the
/// input has focus.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let border_style = if app.focus == PanelFocus::Input {
        theme::highlighted()
    } else {
        theme::normal()
    };

    let content = if app.input.is_empty() {
        Span::styled("What needs to be done?", theme::dimmed())
    } else {
        Span::styled(app.input.as_str(), theme::normal())
    };

    let block = Block::default()
        .title("New task")
        .borders(Borders::ALL)
        .border_style(border_style);
    frame.render_widget(Paragraph::new(content).block(block), area);

    if app.focus == PanelFocus::Input {
        let x = area.x + 1 + u16::try_from(app.cursor_position).unwrap_or(u16::MAX - 1);
        frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}
