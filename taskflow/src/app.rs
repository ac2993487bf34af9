//! Application state and event handling.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::remote::ConnectError;
use crate::store::{AuthorityMode, Filter};

/// Which panel is currently focused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    /// Input box is focused (default).
    Input,
    /// Task list is focused.
    List,
}

/// A modal overlay that captures all input until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    /// A blocking alert; any key dismisses it.
    Alert {
        /// Short heading (e.g. "Error").
        title: String,
        /// The message body.
        message: String,
    },
    /// Confirmation prompt before erasing everything; `y` confirms.
    ConfirmClear,
}

/// Actions the main loop executes against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Add a task with the given text.
    Add(String),
    /// Toggle the completion flag of the selected task.
    ToggleSelected,
    /// Delete the selected task.
    DeleteSelected,
    /// Erase the whole list (already confirmed by the user).
    ClearAll,
}

/// Main application state.
pub struct App {
    /// Current text input.
    pub input: String,
    /// Cursor position in input (character index).
    pub cursor_position: usize,
    /// Active completion-state filter.
    pub filter: Filter,
    /// Which panel is focused.
    pub focus: PanelFocus,
    /// Selected index within the filtered task list.
    pub selected: usize,
    /// Active modal overlay, if any.
    pub modal: Option<Modal>,
    /// Which backend is currently authoritative.
    pub mode: AuthorityMode,
    /// Why the session is local-only, when it is.
    pub fallback_detail: Option<String>,
    /// Whether the failure looks like a setup problem worth explaining.
    pub setup_hint: bool,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Whether the whole session should be torn down and re-initialized.
    pub should_restart: bool,
}

impl App {
    /// Creates the application state for a freshly opened store.
    #[must_use]
    pub fn new(mode: AuthorityMode, init_error: Option<&ConnectError>) -> Self {
        Self {
            input: String::new(),
            cursor_position: 0,
            filter: Filter::All,
            focus: PanelFocus::Input,
            selected: 0,
            modal: None,
            mode,
            fallback_detail: init_error.map(ToString::to_string),
            setup_hint: init_error.is_some_and(ConnectError::is_setup_issue),
            should_quit: false,
            should_restart: false,
        }
    }

    /// Records the mid-session switch to local mode.
    pub fn set_failed_over(&mut self, reason: String) {
        self.mode = AuthorityMode::LocalMirror;
        self.fallback_detail = Some(reason);
    }

    /// Opens a blocking alert modal.
    pub fn show_alert(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.modal = Some(Modal::Alert {
            title: title.into(),
            message: message.into(),
        });
    }

    /// Keeps the selection inside the currently visible list.
    pub fn clamp_selection(&mut self, visible: usize) {
        if visible == 0 {
            self.selected = 0;
        } else if self.selected >= visible {
            self.selected = visible - 1;
        }
    }

    /// Handles one key press, returning an action for the main loop to
    /// execute against the store. `visible` is the length of the filtered
    /// list currently on screen.
    pub fn handle_key_event(&mut self, key: KeyEvent, visible: usize) -> Option<Action> {
        // A modal captures everything.
        if let Some(modal) = self.modal.clone() {
            return self.handle_modal_key(&modal, key);
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }

        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    PanelFocus::Input => PanelFocus::List,
                    PanelFocus::List => PanelFocus::Input,
                };
                None
            }
            _ => match self.focus {
                PanelFocus::Input => self.handle_input_key(key),
                PanelFocus::List => self.handle_list_key(key, visible),
            },
        }
    }

    /// Key handling while a modal is open.
    fn handle_modal_key(&mut self, modal: &Modal, key: KeyEvent) -> Option<Action> {
        self.modal = None;
        match modal {
            Modal::Alert { .. } => None,
            Modal::ConfirmClear => match key.code {
                KeyCode::Char('y' | 'Y') => Some(Action::ClearAll),
                _ => None,
            },
        }
    }

    /// Key handling while the input box is focused.
    fn handle_input_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Enter => {
                if self.input.trim().is_empty() {
                    None
                } else {
                    Some(Action::Add(self.input.clone()))
                }
            }
            KeyCode::Char(c) => {
                let byte_index = self.byte_index();
                self.input.insert(byte_index, c);
                self.cursor_position += 1;
                None
            }
            KeyCode::Backspace => {
                if self.cursor_position > 0 {
                    self.cursor_position -= 1;
                    let byte_index = self.byte_index();
                    self.input.remove(byte_index);
                }
                None
            }
            KeyCode::Left => {
                self.cursor_position = self.cursor_position.saturating_sub(1);
                None
            }
            KeyCode::Right => {
                if self.cursor_position < self.input.chars().count() {
                    self.cursor_position += 1;
                }
                None
            }
            _ => None,
        }
    }

    /// Key handling while the task list is focused.
    fn handle_list_key(&mut self, key: KeyEvent, visible: usize) -> Option<Action> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if visible > 0 && self.selected < visible - 1 {
                    self.selected += 1;
                }
                None
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                (visible > 0).then_some(Action::ToggleSelected)
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                (visible > 0).then_some(Action::DeleteSelected)
            }
            KeyCode::Char('1') => {
                self.set_filter(Filter::All);
                None
            }
            KeyCode::Char('2') => {
                self.set_filter(Filter::Active);
                None
            }
            KeyCode::Char('3') => {
                self.set_filter(Filter::Completed);
                None
            }
            KeyCode::Char('f') => {
                self.set_filter(self.filter.next());
                None
            }
            KeyCode::Char('c') => {
                if self.mode == AuthorityMode::LocalMirror {
                    self.modal = Some(Modal::ConfirmClear);
                }
                None
            }
            KeyCode::Char('r') => {
                // Reconnecting means redoing the whole initialization, so it
                // is only offered once a session has actually fallen back.
                if self.mode == AuthorityMode::LocalMirror && self.fallback_detail.is_some() {
                    self.should_restart = true;
                }
                None
            }
            KeyCode::Char('q') => {
                self.should_quit = true;
                None
            }
            _ => None,
        }
    }

    /// Switches the filter and resets the selection.
    fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.selected = 0;
    }

    /// Byte offset of the cursor within the input string.
    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .map(|(i, _)| i)
            .nth(self.cursor_position)
            .unwrap_or(self.input.len())
    }
}
