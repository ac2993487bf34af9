//! `TaskFlow` — terminal task list with realtime sync and local fallback.
//!
//! Launches the TUI and subscribes to a sync server when one is configured.
//! Without one — or when the server cannot be reached — the session runs
//! against the local snapshot instead. Configuration via CLI flags,
//! environment variables, or config file (`~/.config/taskflow/config.toml`).
//!
//! ```bash
//! # Local-only session
//! cargo run --bin taskflow
//!
//! # Against a sync server
//! cargo run --bin taskflow -- --server-url ws://127.0.0.1:7878/ws
//!
//! # Or via environment variable
//! TASKFLOW_SERVER_URL=ws://127.0.0.1:7878/ws cargo run --bin taskflow
//! ```

use std::io;
use std::path::Path;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing_appender::non_blocking::WorkerGuard;

use taskflow::app::{Action, App};
use taskflow::config::{CliArgs, ClientConfig};
use taskflow::mirror::MirrorStore;
use taskflow::store::{StoreEvent, TaskStore};
use taskflow::ui;
use taskflow_proto::task::TaskId;

/// How one session ended.
enum SessionOutcome {
    /// The user quit; leave the process.
    Quit,
    /// The user asked to reconnect; run the whole initialization again.
    Restart,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    // Load and resolve configuration (CLI args > config file > env > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Initialize logging before terminal setup (logs go to file, not stdout).
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("taskflow starting");

    // Set up terminal.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Each pass through this loop is a full session: reconnecting is a
    // restart of the whole initialization, not an in-place retry.
    let result = loop {
        match run_session(&mut terminal, &config).await {
            Ok(SessionOutcome::Quit) => break Ok(()),
            Ok(SessionOutcome::Restart) => {
                tracing::info!("restarting session");
            }
            Err(e) => break Err(e),
        }
    };

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("taskflow exiting");
    result
}

/// Initialize file-based logging.
///
/// Logs are written to a file (never stdout, since ratatui owns the
/// terminal). Returns a [`WorkerGuard`] that must be held until shutdown to
/// ensure all buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskflow.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// One full session: open the store, run the TUI loop until quit or restart.
async fn run_session(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &ClientConfig,
) -> io::Result<SessionOutcome> {
    let mirror = MirrorStore::new(config.mirror_path());
    let remote_config = config.to_remote_config();

    let (mut store, init_error) = TaskStore::open(remote_config.as_ref(), mirror).await;
    let mut app = App::new(store.mode(), init_error.as_ref());

    loop {
        // Step 1: Apply everything the subscription delivered, then draw.
        for store_event in store.pump() {
            match store_event {
                StoreEvent::ListChanged => {}
                StoreEvent::FailedOver { reason } => app.set_failed_over(reason),
            }
        }
        app.clamp_selection(store.tasks(app.filter).len());

        terminal.draw(|frame| ui::draw(frame, &app, &store))?;

        // Step 2: Poll for terminal input events.
        if event::poll(config.poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }

            let visible = store.tasks(app.filter).len();
            if let Some(action) = app.handle_key_event(key, visible) {
                dispatch(&mut app, &mut store, action).await;
            }
        }

        if app.should_quit {
            return Ok(SessionOutcome::Quit);
        }
        if app.should_restart {
            return Ok(SessionOutcome::Restart);
        }
    }
}

/// Execute one user action against the store, surfacing failures as a
/// blocking alert.
async fn dispatch(app: &mut App, store: &mut TaskStore, action: Action) {
    match action {
        Action::Add(text) => match store.add_task(&text).await {
            Ok(true) => {
                app.input.clear();
                app.cursor_position = 0;
            }
            Ok(false) => {}
            Err(e) => app.show_alert("Error", e.to_string()),
        },
        Action::ToggleSelected => {
            if let Some(id) = selected_id(app, store)
                && let Err(e) = store.toggle_task(&id).await
            {
                app.show_alert("Error", e.to_string());
            }
        }
        Action::DeleteSelected => {
            if let Some(id) = selected_id(app, store)
                && let Err(e) = store.delete_task(&id).await
            {
                app.show_alert("Error", e.to_string());
            }
        }
        Action::ClearAll => {
            if let Err(e) = store.clear_all() {
                app.show_alert("Error", e.to_string());
            }
        }
    }
}

/// Resolve the selected row in the filtered view to a task id.
fn selected_id(app: &App, store: &TaskStore) -> Option<TaskId> {
    store.tasks(app.filter).get(app.selected).map(|t| t.id.clone())
}
