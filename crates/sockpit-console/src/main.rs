mod state;
mod theme;
mod ui;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use sockpit_client::backend::{Backend, DEFAULT_HTTP_TIMEOUT};
use sockpit_client::poller::{PollEvent, Poller, DEFAULT_POLL_INTERVAL};
use sockpit_core::logfeed::{LogFeed, DEFAULT_BACKEND_CAP, DEFAULT_LOCAL_CAP};
use state::{ActionKind, App, ConsoleCommand, ConsoleEvent, COMMAND_QUEUE_CAPACITY};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Clone, Debug)]
struct Config {
    base_url: String,
    poll_interval: Duration,
    http_timeout: Duration,
    local_log_cap: usize,
    backend_log_cap: usize,
}

#[derive(Parser, Debug)]
#[command(name = "sockpit")]
struct Args {
    /// Relay control endpoint, e.g. http://127.0.0.1:5000
    #[arg(long, default_value = "")]
    url: String,
    #[arg(long, default_value_t = 0)]
    poll_ms: u64,
    #[arg(long, default_value_t = 0)]
    http_timeout_ms: u64,
}

// Single-threaded runtime: poll results, action results, and key input all
// land in one select loop, and App is only ever touched between awaits.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = load_config();
    init_logging();
    info!(event = "console_started", url = %config.base_url);

    let backend = Backend::with_timeout(config.base_url.clone(), config.http_timeout);
    let base_url = backend.base_url().to_string();
    let (poller, poll_rx) = Poller::start(backend.clone(), config.poll_interval);

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    tokio::spawn(action_loop(backend, cmd_rx, event_tx));

    let feed = LogFeed::with_caps(config.local_log_cap, config.backend_log_cap);
    let mut app = App::new(base_url, cmd_tx, poller.poke_handle(), feed);

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, poll_rx, event_rx).await;
    poller.stop();
    restore_terminal(&mut terminal)?;

    if let Err(err) = result {
        eprintln!("sockpit-console: {err}");
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut poll_rx: mpsc::Receiver<PollEvent>,
    mut event_rx: mpsc::Receiver<ConsoleEvent>,
) -> Result<()> {
    let mut events = EventStream::new();
    // Notes expire on wall time, so the view needs redraws even when no poll
    // or key event arrives.
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    loop {
        app.expire_note();
        terminal.draw(|f| ui::render(f, app))?;

        tokio::select! {
            Some(event) = poll_rx.recv() => {
                app.apply_poll_event(event);
            }
            Some(event) = event_rx.recv() => {
                app.apply_console_event(event);
            }
            maybe_event = events.next() => {
                if let Some(Ok(Event::Key(key))) = maybe_event {
                    if key.kind == KeyEventKind::Press {
                        app.handle_key(key);
                    }
                }
            }
            _ = redraw.tick() => {}
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

async fn action_loop(
    backend: Backend,
    mut commands: mpsc::Receiver<ConsoleCommand>,
    events: mpsc::Sender<ConsoleEvent>,
) {
    while let Some(command) = commands.recv().await {
        let event = match command {
            ConsoleCommand::StartServer => ConsoleEvent::Action {
                kind: ActionKind::Start,
                result: backend.start_server().await,
            },
            ConsoleCommand::StopServer => ConsoleEvent::Action {
                kind: ActionKind::Stop,
                result: backend.stop_server().await,
            },
            ConsoleCommand::SaveConfig(config) => ConsoleEvent::Action {
                kind: ActionKind::SaveConfig,
                result: backend.save_config(&config).await,
            },
            ConsoleCommand::FetchConfig => ConsoleEvent::Config(backend.fetch_config().await),
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
    debug!(event = "action_loop_stopped");
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn load_config() -> Config {
    let args = Args::parse();
    let base_url = resolve_base_url(&args.url);
    let poll_interval = resolve_millis("SOCKPIT_POLL_MS", args.poll_ms, DEFAULT_POLL_INTERVAL);
    let http_timeout = resolve_millis(
        "SOCKPIT_HTTP_TIMEOUT_MS",
        args.http_timeout_ms,
        DEFAULT_HTTP_TIMEOUT,
    );
    let local_log_cap = resolve_cap("SOCKPIT_LOCAL_LOG_CAP", DEFAULT_LOCAL_CAP);
    let backend_log_cap = resolve_cap("SOCKPIT_BACKEND_LOG_CAP", DEFAULT_BACKEND_CAP);
    Config {
        base_url,
        poll_interval,
        http_timeout,
        local_log_cap,
        backend_log_cap,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = matches!(
        std::env::var("SOCKPIT_LOG_STDOUT").ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES")
    );
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

fn resolve_base_url(flag: &str) -> String {
    if !flag.trim().is_empty() {
        return flag.trim().to_string();
    }
    if let Ok(value) = std::env::var("SOCKPIT_URL") {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }
    DEFAULT_BASE_URL.to_string()
}

fn resolve_millis(key: &str, flag_ms: u64, default: Duration) -> Duration {
    if flag_ms > 0 {
        return Duration::from_millis(flag_ms);
    }
    if let Ok(value) = std::env::var(key) {
        if let Ok(ms) = value.trim().parse::<u64>() {
            if ms > 0 {
                return Duration::from_millis(ms);
            }
        }
    }
    default
}

fn resolve_cap(key: &str, default: usize) -> usize {
    if let Ok(value) = std::env::var(key) {
        if let Ok(cap) = value.trim().parse::<usize>() {
            if cap > 0 {
                return cap;
            }
        }
    }
    default
}
