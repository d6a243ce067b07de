use crate::cache::SharedPageCache;
use crate::commands::{self, QUIT};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::source::{Record, TableClient};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::extract_domain;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::RecordListView;
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info};

/// Short enough that debounce deadlines are met within a tick
const TICK_RATE: Duration = Duration::from_millis(50);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command overlay
  command_input: CommandInput,

  /// Application configuration
  config: Config,

  /// Table API client
  client: TableClient,

  /// Page cache shared by every list view
  cache: SharedPageCache<Record>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let client = TableClient::new(&config)?;
    let cache = SharedPageCache::new(config.loading.max_entries);
    let command_input = CommandInput::new(commands::build_commands(&config.resources));

    Ok(Self {
      view_stack: Vec::new(),
      command_input,
      config,
      client,
      cache,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    let resource = self
      .config
      .startup_resource()
      .ok_or_else(|| eyre!("no resources configured"))?
      .name
      .clone();
    self.open_resource(&resource);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      let Some(event) = events.next().await else {
        break;
      };
      self.handle_event(event);
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Resize | Event::Tick => {}
    }

    // Ticks stall while keys are held, so poll after every event
    for view in &mut self.view_stack {
      view.tick();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let overlay_open = self.current_view().is_some_and(|v| v.captures_input());
    if !overlay_open {
      match self.command_input.handle_key(key) {
        KeyResult::Handled | KeyResult::Event(CommandEvent::Cancelled) => return,
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.view_stack.last_mut() else {
      return;
    };
    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    if cmd == QUIT {
      self.should_quit = true;
    } else if self.config.resource(cmd).is_some() {
      self.open_resource(cmd);
    } else {
      debug!(command = cmd, "unknown command");
    }
  }

  /// Replace the whole stack with a list of `name`
  fn open_resource(&mut self, name: &str) {
    let Some(resource) = self.config.resource(name).cloned() else {
      return;
    };
    info!(resource = %resource.name, table = resource.table(), "opening resource");

    let view = RecordListView::new(
      self.client.clone(),
      resource,
      self.config.loading,
      self.cache.clone(),
    );
    // Dropping the old views cancels their fetches
    self.view_stack.clear();
    self.view_stack.push(Box::new(view));
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut (dyn View + 'static)> {
    self.view_stack.last_mut().map(|v| v.as_mut())
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  /// Configured title, or the source's domain
  pub fn title(&self) -> &str {
    self
      .config
      .title
      .as_deref()
      .unwrap_or_else(|| extract_domain(&self.config.source.url))
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }
}
