use crate::config::ResourceConfig;
use crate::source::types::value_text;
use crate::source::{Record, TableClient};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::warn;

type Reply = Result<Record, String>;

/// Single record, shown immediately from the list and refreshed in the background
pub struct RecordDetailView {
  client: TableClient,
  resource: ResourceConfig,
  record: Record,
  receiver: Option<mpsc::UnboundedReceiver<Reply>>,
  error: Option<String>,
  scroll: u16,
}

impl RecordDetailView {
  pub fn new(client: TableClient, resource: ResourceConfig, record: Record) -> Self {
    let mut view = Self {
      client,
      resource,
      record,
      receiver: None,
      error: None,
      scroll: 0,
    };
    view.reload();
    view
  }

  /// Fetch the latest copy; a reload in flight is superseded
  fn reload(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = self.client.clone();
    let table = self.resource.table().to_string();
    let id = self.record.id.clone();

    tokio::spawn(async move {
      let reply = client
        .get_record(&table, &id)
        .await
        .map_err(|e| e.to_string());
      let _ = tx.send(reply);
    });

    self.receiver = Some(rx);
  }

  fn poll(&mut self) {
    let Some(receiver) = self.receiver.as_mut() else {
      return;
    };

    match receiver.try_recv() {
      Ok(Ok(record)) => {
        self.record = record;
        self.error = None;
      }
      Ok(Err(error)) => {
        warn!(id = %self.record.id, %error, "record reload failed");
        self.error = Some(error);
      }
      Err(TryRecvError::Empty) => return,
      Err(TryRecvError::Disconnected) => {}
    }
    self.receiver = None;
  }

  fn lines(&self) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::Cyan).bold();
    let mut lines = vec![Line::from(vec![
      Span::styled("id: ", label),
      Span::raw(self.record.id.clone()),
    ])];

    if let Some(created) = self.record.created {
      lines.push(Line::from(vec![
        Span::styled("created: ", label),
        Span::raw(created.format("%Y-%m-%d %H:%M").to_string()),
      ]));
    }
    lines.push(Line::default());

    for (name, value) in &self.record.fields {
      lines.push(Line::from(vec![
        Span::styled(format!("{}: ", name), label),
        Span::raw(value_text(value)),
      ]));
    }
    lines
  }
}

impl View for RecordDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('g') | KeyCode::Home => self.scroll = 0,
      KeyCode::Char('r') => self.reload(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = self.record.title(self.resource.title_field.as_deref());
    let suffix = if self.is_loading() { " (loading...)" } else { "" };

    let block = Block::default()
      .title(format!(" {}{} ", title, suffix))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = Paragraph::new(self.lines())
      .block(block)
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.record.id.clone()
  }

  fn is_loading(&self) -> bool {
    self.receiver.is_some()
  }

  fn status(&self) -> Option<String> {
    self.error.clone()
  }

  fn tick(&mut self) {
    self.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("r", "reload").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn view() -> RecordDetailView {
    let client = TableClient::with_token("http://10.255.255.1:9/v1", String::new()).unwrap();
    let resource = ResourceConfig {
      name: "campaigns".to_string(),
      table: None,
      title_field: Some("Name".to_string()),
      columns: Vec::new(),
      aliases: Vec::new(),
      description: None,
    };
    let mut record = Record {
      id: "rec1".to_string(),
      created: None,
      fields: Default::default(),
    };
    record
      .fields
      .insert("Name".to_string(), serde_json::json!("Spring launch"));
    RecordDetailView::new(client, resource, record)
  }

  #[tokio::test]
  async fn test_reload_starts_on_open() {
    let view = view();
    assert!(view.is_loading());
    assert_eq!(view.breadcrumb_label(), "rec1");
  }

  #[tokio::test]
  async fn test_reply_replaces_record() {
    let mut view = view();
    let (tx, rx) = mpsc::unbounded_channel();
    view.receiver = Some(rx);

    let mut fresh = view.record.clone();
    fresh
      .fields
      .insert("Status".to_string(), serde_json::json!("Paused"));
    tx.send(Ok(fresh)).unwrap();

    view.tick();
    assert!(!view.is_loading());
    assert_eq!(view.record.field_text("Status"), "Paused");
  }

  #[tokio::test]
  async fn test_failed_reload_keeps_record() {
    let mut view = view();
    let (tx, rx) = mpsc::unbounded_channel();
    view.receiver = Some(rx);
    tx.send(Err("HTTP 404".to_string())).unwrap();

    view.tick();
    assert_eq!(view.status().as_deref(), Some("HTTP 404"));
    assert_eq!(view.record.field_text("Name"), "Spring launch");
  }
}
