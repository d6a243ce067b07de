use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// Key hint rendered in the header, sorted by ascending `priority`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8,
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// What the App should do with the view stack after a key press
pub enum ViewAction {
  None,
  Push(Box<dyn View>),
  /// Leave this view; popping the root quits
  Pop,
}

/// A screen on the view stack.
///
/// Input flows App → View → components. Views own their loaders and
/// debouncers and advance them in [`View::tick`], which the App calls for
/// every view on the stack after every event, so background views keep
/// applying results.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// True while an overlay owns the keyboard, so `:` is typed rather than
  /// opening the command palette
  fn captures_input(&self) -> bool {
    false
  }

  /// Cache key of the data being browsed, for the header
  fn resource(&self) -> Option<&str> {
    None
  }

  /// Whether a request is outstanding; drives the header spinner
  fn is_loading(&self) -> bool {
    false
  }

  /// Message for the footer, usually the last load error
  fn status(&self) -> Option<String> {
    None
  }

  fn tick(&mut self) {}

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
