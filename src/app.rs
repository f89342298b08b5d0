use crate::cache::StatusUpdate;
use crate::commands::{self, Command};
use crate::dashboard::{Outcome, Snapshot, LOCATING};
use crate::event::{self, Event, EventHandler};
use crate::runtime::Runtime;
use crate::ui;
use crate::worker::{WorkerEvent, WorkerState};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
  Search,
}

/// Main application state
pub struct App {
  runtime: Runtime,

  /// Manual place used when no position can be resolved
  manual_place: Option<String>,

  /// Current input mode
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Place query input (after pressing /)
  search_input: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Location label in the header
  location: String,

  /// Last loaded data
  snapshot: Option<Box<Snapshot>>,

  /// An orchestration was started and has not reported back yet
  loading: bool,

  /// Newest orchestration whose result was applied
  shown_generation: u64,

  /// Offline indicator and last-updated label
  status: StatusUpdate,

  /// One-line message in the status bar
  message: Option<String>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(runtime: Runtime, manual_place: Option<String>) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();
    let status = runtime.cache.subscribe().borrow().clone();

    Self {
      runtime,
      manual_place,
      mode: Mode::Normal,
      command_input: String::new(),
      search_input: String::new(),
      selected_suggestion: 0,
      location: LOCATING.to_string(),
      snapshot: None,
      loading: false,
      shown_generation: 0,
      status,
      message: None,
      event_tx: tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();
    event::forward_status(self.runtime.cache.subscribe(), events.sender());
    if let Some(worker_events) = self.runtime.worker_events.take() {
      event::forward_worker(worker_events, events.sender());
    }

    self.refresh();

    let result = self.main_loop(&mut terminal, &mut events).await;

    // Cleanup terminal, even if the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn main_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {} // UI refresh happens automatically
      Event::Status(update) => self.status = update,
      Event::Worker(worker_event) => self.handle_worker_event(worker_event),
      Event::Dashboard(outcome) => self.apply_outcome(outcome),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
      Mode::Search => self.handle_search_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Esc => self.message = None,

      // Mode switches
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Char('/') => {
        self.mode = Mode::Search;
        self.search_input.clear();
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.mode = Mode::Normal;
        self.execute_command();
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let count = commands::get_suggestions(&self.command_input).len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + 1) % count;
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let count = commands::get_suggestions(&self.command_input).len();
        if count > 0 {
          self.selected_suggestion = (self.selected_suggestion + count - 1) % count;
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn handle_search_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.search_input.clear();
      }
      KeyCode::Enter => {
        self.mode = Mode::Normal;
        let query = std::mem::take(&mut self.search_input);
        self.search(query);
      }
      KeyCode::Backspace => {
        self.search_input.pop();
      }
      KeyCode::Char(c) => {
        self.search_input.push(c);
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    // Either the selected suggestion or the raw input
    let suggestions = commands::get_suggestions(&self.command_input);
    let cmd = match suggestions.get(self.selected_suggestion) {
      Some(command) => command.name.to_string(),
      None => self.command_input.trim().to_lowercase(),
    };
    self.command_input.clear();

    match cmd.as_str() {
      "refresh" => self.refresh(),
      "search" => {
        self.mode = Mode::Search;
        self.search_input.clear();
      }
      "status" => self.message = Some(self.status_summary()),
      "quit" => self.should_quit = true,
      other => self.message = Some(format!("Unknown command: {}", other)),
    }
  }

  /// Locate and reload everything in the background.
  fn refresh(&mut self) {
    let dashboard = self.runtime.dashboard.clone();
    let manual_place = self.manual_place.clone();
    self.start_loading();

    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      let outcome = dashboard.locate_and_fetch(manual_place.as_deref()).await;
      let _ = tx.send(Event::Dashboard(outcome));
    });
  }

  fn search(&mut self, query: String) {
    if query.trim().is_empty() {
      return;
    }

    let dashboard = self.runtime.dashboard.clone();
    self.start_loading();

    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      let outcome = dashboard.search(&query).await;
      let _ = tx.send(Event::Dashboard(outcome));
    });
  }

  fn start_loading(&mut self) {
    if self.loading {
      return;
    }
    self.loading = true;
    self.location = LOCATING.to_string();
    self.message = None;
  }

  fn apply_outcome(&mut self, outcome: Outcome) {
    let Some(generation) = outcome.generation() else {
      if let Outcome::Busy = outcome {
        self.message = Some("Already loading…".to_string());
      }
      return;
    };

    if generation < self.shown_generation {
      debug!(generation, shown = self.shown_generation, "dropping stale result");
      return;
    }
    self.shown_generation = generation;
    self.loading = self.runtime.dashboard.latest_generation() > generation;

    match outcome {
      Outcome::Loaded(snapshot) => {
        info!(generation, location = %snapshot.location, "dashboard loaded");
        self.location = snapshot.location.clone();
        self.snapshot = Some(snapshot);
      }
      Outcome::NoLocation { message, .. } => {
        self.location = message;
        self.snapshot = None;
      }
      Outcome::Failed { message, .. } => {
        self.message = Some(message);
      }
      Outcome::Busy | Outcome::Skipped => {}
    }
  }

  fn handle_worker_event(&mut self, event: WorkerEvent) {
    debug!(?event, "worker event");
    match event {
      WorkerEvent::Installed { failed, .. } if failed > 0 => {
        self.message = Some(format!("{} app-shell files could not be cached", failed));
      }
      WorkerEvent::OfflineFallback { .. } => {
        self.status.offline = true;
      }
      _ => {}
    }
  }

  fn status_summary(&self) -> String {
    let worker = match self.runtime.worker_state() {
      Some(WorkerState::Active) => "active",
      Some(WorkerState::Installing) => "installing",
      Some(WorkerState::Activating) => "activating",
      Some(WorkerState::Redundant) => "redundant",
      None => "disabled",
    };
    let connectivity = if self.status.offline {
      "offline"
    } else {
      "online"
    };

    format!(
      "worker {} │ {} │ last updated {}",
      worker, connectivity, self.status.last_updated
    )
  }

  // Accessors for UI rendering
  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn search_input(&self) -> &str {
    &self.search_input
  }

  pub fn location(&self) -> &str {
    &self.location
  }

  pub fn snapshot(&self) -> Option<&Snapshot> {
    self.snapshot.as_deref()
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn status(&self) -> &StatusUpdate {
    &self.status
  }

  pub fn message(&self) -> Option<&str> {
    self.message.as_deref()
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}

/// Run one orchestration and print the result instead of starting the TUI.
pub async fn run_plain(runtime: Runtime, manual_place: Option<&str>) -> Result<()> {
  let outcome = runtime.dashboard.locate_and_fetch(manual_place).await;
  let status = runtime.cache.subscribe().borrow().clone();

  match outcome {
    Outcome::Loaded(snapshot) => {
      for line in ui::text::snapshot_lines(&snapshot, &status.last_updated, snapshot.offline) {
        println!("{}", line);
      }
      Ok(())
    }
    Outcome::NoLocation { message, .. } | Outcome::Failed { message, .. } => {
      Err(color_eyre::eyre::eyre!("{}", message))
    }
    Outcome::Busy | Outcome::Skipped => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use crate::config::Config;
  use crate::dashboard::location::NoLocator;
  use std::sync::Arc;

  async fn app() -> App {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let mut config = Config::default();
    config.worker.enabled = false;
    let runtime = Runtime::with_storage(&config, storage, Arc::new(NoLocator))
      .await
      .unwrap();
    App::new(runtime, None)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[tokio::test]
  async fn test_stale_outcomes_are_dropped() {
    let mut app = app().await;

    app.apply_outcome(Outcome::NoLocation {
      generation: 3,
      message: "newer".to_string(),
    });
    app.apply_outcome(Outcome::NoLocation {
      generation: 2,
      message: "older".to_string(),
    });

    assert_eq!(app.location(), "newer");
  }

  #[tokio::test]
  async fn test_busy_outcome_only_sets_message() {
    let mut app = app().await;
    app.location = "Somewhere".to_string();

    app.apply_outcome(Outcome::Busy);

    assert_eq!(app.location(), "Somewhere");
    assert_eq!(app.message(), Some("Already loading…"));
  }

  #[tokio::test]
  async fn test_command_mode_runs_selected_suggestion() {
    let mut app = app().await;

    app.handle_key(key(KeyCode::Char(':')));
    assert_eq!(app.mode(), &Mode::Command);
    for c in "stat".chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));

    assert_eq!(app.mode(), &Mode::Normal);
    let message = app.message().unwrap();
    assert!(message.starts_with("worker disabled"));
  }

  #[tokio::test]
  async fn test_search_mode_collects_query() {
    let mut app = app().await;

    app.handle_key(key(KeyCode::Char('/')));
    for c in "Oslo".chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Backspace));
    assert_eq!(app.search_input(), "Osl");

    app.handle_key(key(KeyCode::Esc));
    assert_eq!(app.mode(), &Mode::Normal);
    assert_eq!(app.search_input(), "");
  }

  #[tokio::test]
  async fn test_quit_keys() {
    let mut app = app().await;
    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit);
  }
}
