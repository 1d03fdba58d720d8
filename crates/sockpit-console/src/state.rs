use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::TableState;
use sockpit_client::backend::BackendError;
use sockpit_client::poller::PollEvent;
use sockpit_core::logfeed::LogFeed;
use sockpit_core::stats::{self, DisplayTree, TreeRow, TreeState};
use sockpit_core::{ApiResult, ServerConfig, ServerStats};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;

pub const COMMAND_QUEUE_CAPACITY: usize = 8;
pub const NOTE_TTL: Duration = Duration::from_secs(3);

/// Work the key handler hands off to the backend task.
#[derive(Debug)]
pub enum ConsoleCommand {
    StartServer,
    StopServer,
    SaveConfig(ServerConfig),
    FetchConfig,
}

/// Completion of backend work requested through [`ConsoleCommand`].
#[derive(Debug)]
pub enum ConsoleEvent {
    Action {
        kind: ActionKind,
        result: Result<ApiResult, BackendError>,
    },
    Config(Result<ServerConfig, BackendError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Start,
    Stop,
    SaveConfig,
}

#[derive(Debug, Clone)]
pub struct StatusNote {
    pub text: String,
    pub error: bool,
    posted_at: Instant,
}

impl StatusNote {
    fn expired(&self) -> bool {
        self.posted_at.elapsed() >= NOTE_TTL
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SelectionKey {
    Client(usize),
    Target(usize, String),
}

pub struct App {
    pub base_url: String,
    commands: mpsc::Sender<ConsoleCommand>,
    refresh: mpsc::Sender<()>,
    pub connected: bool,
    pub running: bool,
    pub stats: Option<ServerStats>,
    pub display: DisplayTree,
    tree: TreeState,
    pub feed: LogFeed,
    /// `None` follows the tail; `Some` is a manual offset from the top.
    pub log_scroll: Option<u16>,
    pub log_max_scroll: u16,
    pub log_page: u16,
    pub table_state: TableState,
    pub config_form: Option<ConfigForm>,
    pub config_loading: bool,
    pub pending_action: Option<ActionKind>,
    pub status_note: Option<StatusNote>,
    pub last_poll_error: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        base_url: String,
        commands: mpsc::Sender<ConsoleCommand>,
        refresh: mpsc::Sender<()>,
        feed: LogFeed,
    ) -> Self {
        let (display, tree) = stats::render(&TreeState::new(), &ServerStats::default());
        Self {
            base_url,
            commands,
            refresh,
            connected: false,
            running: false,
            stats: None,
            display,
            tree,
            feed,
            log_scroll: None,
            log_max_scroll: 0,
            log_page: 0,
            table_state: TableState::default(),
            config_form: None,
            config_loading: false,
            pending_action: None,
            status_note: None,
            last_poll_error: None,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn apply_poll_event(&mut self, event: PollEvent) {
        match event {
            PollEvent::Status(Ok(status)) => {
                self.connected = true;
                self.last_poll_error = None;
                self.running = status.running;
                if status.running {
                    if let Some(stats) = status.stats {
                        self.apply_stats(stats);
                    }
                }
            }
            PollEvent::Status(Err(err)) => {
                warn!(event = "status_poll_failed", error = %err);
                self.connected = false;
                self.last_poll_error = Some(err.to_string());
            }
            PollEvent::Logs(Ok(reply)) => {
                self.feed.absorb(&reply.logs);
            }
            PollEvent::Logs(Err(err)) => {
                warn!(event = "log_poll_failed", error = %err);
            }
        }
    }

    pub fn apply_console_event(&mut self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::Action { kind, result } => {
                self.pending_action = None;
                self.apply_action_result(kind, result);
            }
            ConsoleEvent::Config(Ok(config)) => {
                if self.config_loading {
                    self.config_loading = false;
                    self.config_form = Some(ConfigForm::new(config));
                }
            }
            ConsoleEvent::Config(Err(err)) => {
                warn!(event = "config_fetch_failed", error = %err);
                self.config_loading = false;
                self.feed.push_local(&format!("Error loading config: {err}"));
                self.post_note("Failed to load configuration", true);
            }
        }
    }

    fn apply_action_result(&mut self, kind: ActionKind, result: Result<ApiResult, BackendError>) {
        match kind {
            ActionKind::Start => match result {
                Ok(reply) if reply.success => {
                    self.running = true;
                    self.feed.push_local("Server started successfully");
                    self.post_note("Server started", false);
                }
                Ok(reply) => {
                    let message = reply.message_or("Failed to start server").to_string();
                    self.feed
                        .push_local(&format!("Failed to start server: {message}"));
                    self.post_note(&message, true);
                }
                Err(err) => {
                    self.feed.push_local(&format!("Error starting server: {err}"));
                    self.post_note("Failed to start server", true);
                }
            },
            ActionKind::Stop => match result {
                Ok(reply) if reply.success => {
                    self.running = false;
                    self.feed.push_local("Server stopped successfully");
                    self.post_note("Server stopped", false);
                }
                Ok(reply) => {
                    let message = reply.message_or("Failed to stop server").to_string();
                    self.feed
                        .push_local(&format!("Failed to stop server: {message}"));
                    self.post_note(&message, true);
                }
                Err(err) => {
                    self.feed.push_local(&format!("Error stopping server: {err}"));
                    self.post_note("Failed to stop server", true);
                }
            },
            ActionKind::SaveConfig => match result {
                Ok(reply) if reply.success => {
                    self.feed.push_local("Configuration saved successfully");
                    self.post_note("Configuration saved", false);
                    self.config_form = None;
                }
                Ok(reply) => {
                    let message = reply.message_or("Failed to save configuration").to_string();
                    self.feed.push_local(&format!("Error: {message}"));
                    self.post_note(&message, true);
                }
                Err(err) => {
                    self.feed.push_local(&format!("Error saving config: {err}"));
                    self.post_note("Failed to save configuration", true);
                }
            },
        }
    }

    fn apply_stats(&mut self, stats: ServerStats) {
        self.stats = Some(stats);
        self.rebuild_display();
    }

    fn rebuild_display(&mut self) {
        let key = self.current_selection_key();
        let (display, tree) = match &self.stats {
            Some(stats) => stats::render(&self.tree, stats),
            None => stats::render(&self.tree, &ServerStats::default()),
        };
        self.display = display;
        self.tree = tree;
        self.restore_selection(key);
    }

    pub fn post_note(&mut self, text: &str, error: bool) {
        self.status_note = Some(StatusNote {
            text: text.to_string(),
            error,
            posted_at: Instant::now(),
        });
    }

    pub fn expire_note(&mut self) {
        if matches!(&self.status_note, Some(note) if note.expired()) {
            self.status_note = None;
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.config_form.is_some() {
            self.handle_config_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Esc => {
                self.config_loading = false;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_selection(1);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_selection(-1);
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                self.toggle_expand();
            }
            KeyCode::Char('s') => {
                if !self.running {
                    self.request_action(ActionKind::Start, ConsoleCommand::StartServer);
                }
            }
            KeyCode::Char('x') => {
                if self.running {
                    self.request_action(ActionKind::Stop, ConsoleCommand::StopServer);
                }
            }
            KeyCode::Char('c') => {
                self.open_config();
            }
            KeyCode::Char('r') => {
                // Off-cadence poll; a refresh already queued absorbs this one.
                let _ = self.refresh.try_send(());
            }
            KeyCode::PageUp => {
                self.scroll_logs_up();
            }
            KeyCode::PageDown => {
                self.scroll_logs_down();
            }
            _ => {}
        }
    }

    fn handle_config_key(&mut self, key: KeyEvent) {
        let Some(form) = self.config_form.as_mut() else {
            return;
        };
        if form.editing {
            match key.code {
                KeyCode::Enter => form.commit_edit(),
                KeyCode::Esc => form.cancel_edit(),
                KeyCode::Backspace => {
                    form.buffer.pop();
                }
                KeyCode::Char(ch) => form.buffer.push(ch),
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Esc => {
                self.config_form = None;
            }
            KeyCode::Down | KeyCode::Char('j') => form.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => form.move_selection(-1),
            KeyCode::Enter | KeyCode::Char(' ') => form.activate(),
            KeyCode::Char('s') => self.submit_config(),
            _ => {}
        }
    }

    fn request_action(&mut self, kind: ActionKind, command: ConsoleCommand) {
        if self.pending_action.is_some() {
            return;
        }
        if self.commands.try_send(command).is_ok() {
            self.pending_action = Some(kind);
        }
    }

    fn open_config(&mut self) {
        if self.config_form.is_some() || self.config_loading {
            return;
        }
        if self.commands.try_send(ConsoleCommand::FetchConfig).is_ok() {
            self.config_loading = true;
        }
    }

    fn submit_config(&mut self) {
        if self.pending_action.is_some() {
            return;
        }
        let Some(form) = &self.config_form else {
            return;
        };
        match form.to_config() {
            Ok(config) => {
                if self
                    .commands
                    .try_send(ConsoleCommand::SaveConfig(config))
                    .is_ok()
                {
                    self.pending_action = Some(ActionKind::SaveConfig);
                }
            }
            Err(message) => self.post_note(&message, true),
        }
    }

    fn toggle_expand(&mut self) {
        let Some(selected) = self.table_state.selected() else {
            return;
        };
        let index = match self.display.rows.get(selected) {
            Some(TreeRow::Client(row)) if row.expandable => row.index,
            Some(TreeRow::Target(row)) => row.client_index,
            _ => return,
        };
        self.tree.toggle(index);
        self.rebuild_display();
    }

    fn current_selection_key(&self) -> Option<SelectionKey> {
        let selected = self.table_state.selected()?;
        match self.display.rows.get(selected)? {
            TreeRow::Empty => None,
            TreeRow::Client(row) => Some(SelectionKey::Client(row.index)),
            TreeRow::Target(row) => {
                Some(SelectionKey::Target(row.client_index, row.address.clone()))
            }
        }
    }

    fn restore_selection(&mut self, key: Option<SelectionKey>) {
        let mut restored = false;
        if let Some(key) = key {
            for (idx, row) in self.display.rows.iter().enumerate() {
                let found = match (&key, row) {
                    (SelectionKey::Client(client), TreeRow::Client(candidate)) => {
                        candidate.index == *client
                    }
                    (SelectionKey::Target(client, address), TreeRow::Target(candidate)) => {
                        candidate.client_index == *client && candidate.address == *address
                    }
                    _ => false,
                };
                if found {
                    self.table_state.select(Some(idx));
                    restored = true;
                    break;
                }
            }
        }

        if restored {
            return;
        }

        if self.display.is_placeholder() {
            self.table_state.select(None);
            return;
        }

        match self.table_state.selected() {
            Some(index) if index < self.display.rows.len() => {}
            Some(_) => self
                .table_state
                .select(Some(self.display.rows.len().saturating_sub(1))),
            None => self.table_state.select(Some(0)),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.display.is_placeholder() {
            return;
        }
        let len = self.display.rows.len() as isize;
        let current = self.table_state.selected().unwrap_or(0) as isize;
        let mut next = current + delta;
        if next < 0 {
            next = len - 1;
        }
        if next >= len {
            next = 0;
        }
        self.table_state.select(Some(next as usize));
    }

    fn scroll_logs_up(&mut self) {
        let page = self.log_page.max(1);
        let current = self.log_scroll.unwrap_or(self.log_max_scroll);
        self.log_scroll = Some(current.saturating_sub(page));
    }

    fn scroll_logs_down(&mut self) {
        let page = self.log_page.max(1);
        let Some(current) = self.log_scroll else {
            return;
        };
        let next = current.saturating_add(page);
        if next >= self.log_max_scroll {
            self.log_scroll = None;
        } else {
            self.log_scroll = Some(next);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    Server,
    ServerPort,
    Password,
    Method,
    Timeout,
    MaxConnections,
    TargetConnectTimeout,
    FastOpen,
    Workers,
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Secret,
    Number,
    Flag,
}

#[derive(Debug, Clone)]
pub struct FormField {
    pub id: FieldId,
    pub label: &'static str,
    pub kind: FieldKind,
    pub value: String,
}

/// Editable view of the relay configuration. Unknown keys ride along on the
/// loaded snapshot and are sent back untouched; an empty password field means
/// "keep the stored one", matching the backend's save contract.
pub struct ConfigForm {
    pub fields: Vec<FormField>,
    pub selected: usize,
    pub editing: bool,
    pub buffer: String,
    loaded: ServerConfig,
}

impl ConfigForm {
    pub fn new(config: ServerConfig) -> Self {
        let password = if config.password_is_masked() {
            String::new()
        } else {
            config.password.clone()
        };
        let flag = |set: bool| if set { "on" } else { "off" }.to_string();
        let fields = vec![
            FormField {
                id: FieldId::Server,
                label: "Bind address",
                kind: FieldKind::Text,
                value: config.server.clone(),
            },
            FormField {
                id: FieldId::ServerPort,
                label: "Port",
                kind: FieldKind::Number,
                value: config.server_port.to_string(),
            },
            FormField {
                id: FieldId::Password,
                label: "Password",
                kind: FieldKind::Secret,
                value: password,
            },
            FormField {
                id: FieldId::Method,
                label: "Method",
                kind: FieldKind::Text,
                value: config.method.clone(),
            },
            FormField {
                id: FieldId::Timeout,
                label: "Idle timeout (s)",
                kind: FieldKind::Number,
                value: config.timeout.to_string(),
            },
            FormField {
                id: FieldId::MaxConnections,
                label: "Max connections",
                kind: FieldKind::Number,
                value: config.max_connections.to_string(),
            },
            FormField {
                id: FieldId::TargetConnectTimeout,
                label: "Target connect timeout (s)",
                kind: FieldKind::Number,
                value: config.target_connect_timeout.to_string(),
            },
            FormField {
                id: FieldId::FastOpen,
                label: "TCP fast open",
                kind: FieldKind::Flag,
                value: flag(config.fast_open),
            },
            FormField {
                id: FieldId::Workers,
                label: "Workers",
                kind: FieldKind::Number,
                value: config.workers.to_string(),
            },
            FormField {
                id: FieldId::Verbose,
                label: "Verbose logging",
                kind: FieldKind::Flag,
                value: flag(config.verbose),
            },
        ];
        Self {
            fields,
            selected: 0,
            editing: false,
            buffer: String::new(),
            loaded: config,
        }
    }

    pub fn to_config(&self) -> Result<ServerConfig, String> {
        let mut config = self.loaded.clone();
        for field in &self.fields {
            let value = field.value.trim();
            match field.id {
                FieldId::Server => config.server = value.to_string(),
                FieldId::ServerPort => config.server_port = parse_field(field.label, value)?,
                FieldId::Password => config.password = field.value.clone(),
                FieldId::Method => config.method = value.to_string(),
                FieldId::Timeout => config.timeout = parse_field(field.label, value)?,
                FieldId::MaxConnections => {
                    config.max_connections = parse_field(field.label, value)?;
                }
                FieldId::TargetConnectTimeout => {
                    config.target_connect_timeout = parse_field(field.label, value)?;
                }
                FieldId::FastOpen => config.fast_open = field.value == "on",
                FieldId::Workers => config.workers = parse_field(field.label, value)?,
                FieldId::Verbose => config.verbose = field.value == "on",
            }
        }
        Ok(config)
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.fields.len() as isize;
        let mut next = self.selected as isize + delta;
        if next < 0 {
            next = len - 1;
        }
        if next >= len {
            next = 0;
        }
        self.selected = next as usize;
    }

    fn activate(&mut self) {
        let field = &mut self.fields[self.selected];
        match field.kind {
            FieldKind::Flag => {
                field.value = if field.value == "on" { "off" } else { "on" }.to_string();
            }
            _ => {
                self.buffer = field.value.clone();
                self.editing = true;
            }
        }
    }

    fn commit_edit(&mut self) {
        self.fields[self.selected].value = std::mem::take(&mut self.buffer);
        self.editing = false;
    }

    fn cancel_edit(&mut self) {
        self.buffer.clear();
        self.editing = false;
    }
}

fn parse_field<T: std::str::FromStr>(label: &'static str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{label} must be a number"))
}
