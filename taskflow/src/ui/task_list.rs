//! Task list rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
};

use super::theme;
use crate::app::{App, PanelFocus};
use crate::store::{Filter, TaskStore};

/// Render the filter tabs.
pub fn render_tabs(frame: &mut Frame, area: Rect, app: &App) {
    let titles = [Filter::All, Filter::Active, Filter::Completed]
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{} ({})", f.label(), i + 1));

    let selected = match app.filter {
        Filter::All => 0,
        Filter::Active => 1,
        Filter::Completed => 2,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(theme::dimmed())
        .highlight_style(theme::highlighted());
    frame.render_widget(tabs, area);
}

/// Render the task list for the active filter, or an empty-state message.
pub fn render(frame: &mut Frame, area: Rect, app: &App, store: &TaskStore) {
    let border_style = if app.focus == PanelFocus::List {
        theme::highlighted()
    } else {
        theme::normal()
    };
    let block = Block::default()
        .title(Span::styled("Tasks", theme::panel_title(theme::TASKS_TITLE)))
        .borders(Borders::ALL)
        .border_style(border_style);

    let tasks = store.tasks(app.filter);
    if tasks.is_empty() {
        let message = match app.filter {
            Filter::All => "Add a new task to get started",
            Filter::Active => "All tasks completed",
            Filter::Completed => "No completed tasks yet",
        };
        let paragraph = Paragraph::new(Span::styled(message, theme::dimmed()))
            .centered()
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
            let checkbox = if task.completed { "[x]" } else { "[ ]" };
            let text_style = if task.completed {
                theme::completed()
            } else {
                theme::normal()
            };

            let mut spans = vec![
                Span::styled(checkbox, theme::dimmed()),
                Span::raw(" "),
                Span::styled(task.text.as_str(), text_style),
            ];
            if let Some(ms) = task.created_at {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(format_timestamp_ms(ms), theme::dimmed()));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(theme::selected());

    let mut state = ListState::default();
    if app.focus == PanelFocus::List {
        state.select(Some(app.selected));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

/// Format an epoch-millisecond timestamp as "HH:MM".
fn format_timestamp_ms(ms: u64) -> String {
    use chrono::{Local, TimeZone};
    let secs = (ms / 1000).cast_signed();
    let nsecs = u32::try_from((ms % 1000) * 1_000_000).unwrap_or(0);
    match Local.timestamp_opt(secs, nsecs) {
        chrono::LocalResult::Single(dt) => dt.format("%H:%M").to_string(),
        _ => "??:??".to_string(),
    }
}
