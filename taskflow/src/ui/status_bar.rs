//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, PanelFocus};
use crate::store::AuthorityMode;

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let help_text = match app.focus {
        PanelFocus::Input => "Enter: add | Tab: tasks | Esc: quit",
        PanelFocus::List => {
            if app.mode == AuthorityMode::LocalMirror {
                "Space: toggle | d: delete | 1/2/3: filter | c: clear all | r: reconnect | Esc: quit"
            } else {
                "Space: toggle | d: delete | 1/2/3: filter | Tab: input | Esc: quit"
            }
        }
    };

    let (dot_color, status_text) = match app.mode {
        AuthorityMode::RemoteLive => (theme::SUCCESS, "Synced".to_string()),
        AuthorityMode::LocalMirror => {
            let detail = app
                .fallback_detail
                .as_deref()
                .map_or(String::new(), |d| format!(" ({d})"));
            (theme::WARNING, format!("Local only{detail}"))
        }
    };

    let status_line = Line::from(vec![
        Span::styled("TaskFlow v0.1.0", theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(dot_color)),
        Span::raw(format!(" {status_text}")),
        Span::raw(" | "),
        Span::styled(help_text, theme::dimmed()),
    ]);

    let paragraph = Paragraph::new(status_line).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
