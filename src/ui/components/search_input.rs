use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Filter text reported to the owning view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Every edit, and an empty string when the overlay is cancelled.
  /// The view debounces these.
  Changed(String),
  /// Enter: apply now and close the overlay
  Submitted(String),
}

/// `/` filter overlay
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open the overlay with `current` as the starting text
  pub fn activate(&mut self, current: &str) {
    self.active = true;
    self.input.set_value(current);
  }

  /// Offer a key to the overlay. `/` opens it with `current` prefilled;
  /// while open it swallows every key.
  pub fn handle_key(&mut self, key: KeyEvent, current: &str) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code != KeyCode::Char('/') {
        return KeyResult::NotHandled;
      }
      self.activate(current);
      return KeyResult::Handled;
    }

    let event = match self.input.handle_key(key) {
      InputResult::Consumed => SearchEvent::Changed(self.input.value().to_string()),
      InputResult::Submitted(text) => {
        self.active = false;
        SearchEvent::Submitted(text)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        SearchEvent::Changed(String::new())
      }
      InputResult::NotHandled => return KeyResult::Handled,
    };
    KeyResult::Event(event)
  }

  /// Draw the overlay in the top-left corner of `area`; `pending` marks
  /// text that has not been applied yet
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, pending: bool) {
    if !self.active {
      return;
    }

    let rect = Rect::new(
      area.x + 1,
      area.y + 1,
      (area.width * 60 / 100).clamp(30, 60),
      3,
    )
    .intersection(area);
    frame.render_widget(Clear, rect);

    let (title, color) = if pending {
      (" Filter (pending) ", Color::DarkGray)
    } else {
      (" Filter ", Color::Yellow)
    };
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(color))
      .title(title);

    let text = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(text).block(block), rect);
  }
}
