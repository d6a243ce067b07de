use crate::cache::SharedPageCache;
use crate::config::{LoadingConfig, ResourceConfig};
use crate::debounce::Debouncer;
use crate::loader::IncrementalLoader;
use crate::source::{Record, TableClient};
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::renderfns::{column, status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::RecordDetailView;
use crate::visibility::{sentinel_visible, VisibilityTrigger};
use crate::window::{self, WindowParams, WindowSpec};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{
  Block, Borders, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
  ScrollbarState,
};
use tokio::sync::mpsc;
use tracing::info;

/// Rows per record
const ITEM_HEIGHT: usize = 1;

const TITLE_WIDTH: usize = 36;
const FIELD_WIDTH: usize = 18;

type PrefetchTrigger = VisibilityTrigger<Box<dyn FnMut()>>;

/// Infinite-scroll list of one table's records
pub struct RecordListView {
  client: TableClient,
  resource: ResourceConfig,
  settings: LoadingConfig,
  cache: SharedPageCache<Record>,
  loader: IncrementalLoader<Record>,
  filter: Debouncer<String>,
  search: SearchInput,
  prefetch: PrefetchTrigger,
  prefetch_rx: mpsc::UnboundedReceiver<()>,
  selected: usize,
  scroll_top: usize,
  viewport_height: usize,
}

impl RecordListView {
  pub fn new(
    client: TableClient,
    resource: ResourceConfig,
    settings: LoadingConfig,
    cache: SharedPageCache<Record>,
  ) -> Self {
    let mut loader = build_loader(&client, &resource, "", &settings, &cache);
    loader.load_more();

    let (tx, prefetch_rx) = mpsc::unbounded_channel();
    let prefetch: PrefetchTrigger = VisibilityTrigger::new(Box::new(move || {
      let _ = tx.send(());
    }));

    Self {
      client,
      resource,
      filter: Debouncer::new(String::new(), settings.debounce_delay()),
      settings,
      cache,
      loader,
      search: SearchInput::new(),
      prefetch,
      prefetch_rx,
      selected: 0,
      scroll_top: 0,
      viewport_height: 0,
    }
  }

  fn records(&self) -> &[Record] {
    self.loader.items()
  }

  /// Rows in the list, counting the trailing "loading more" row
  fn row_count(&self) -> usize {
    self.records().len() + usize::from(self.loader.has_more())
  }

  fn current_window(&self) -> WindowSpec {
    window::window(
      &WindowParams::new(
        self.scroll_top,
        ITEM_HEIGHT,
        self.viewport_height,
        self.row_count(),
      )
      .with_overscan(self.settings.overscan),
    )
  }

  /// Swap in a loader for the committed filter text
  fn apply_filter(&mut self) {
    let filter = self.filter.value().clone();
    info!(resource = %self.resource.name, %filter, "applying filter");

    // Dropping the old loader cancels its fetch
    self.loader = build_loader(
      &self.client,
      &self.resource,
      &filter,
      &self.settings,
      &self.cache,
    );
    self.loader.load_more();
    self.selected = 0;
    self.scroll_top = 0;
    self.prefetch.reset();
  }

  fn refresh(&mut self) {
    self.loader.refresh();
    self.selected = 0;
    self.scroll_top = 0;
    self.prefetch.reset();
  }

  /// Feed the sentinel's visibility to the prefetch trigger and act on it
  fn check_prefetch(&mut self) {
    let state = self.loader.state();
    let visible = self.viewport_height > 0
      && state.has_more
      && !state.is_loading
      && state.error.is_none()
      && sentinel_visible(&self.current_window(), state.items.len());

    self.prefetch.observe(visible);
    while self.prefetch_rx.try_recv().is_ok() {
      self.loader.load_more();
    }
  }

  fn move_selection(&mut self, delta: isize) {
    let len = self.records().len();
    if len == 0 {
      self.selected = 0;
      return;
    }

    self.selected = self.selected.saturating_add_signed(delta).min(len - 1);
    self.scroll_top = window::scroll_into_view(
      self.scroll_top,
      self.selected,
      ITEM_HEIGHT,
      self.viewport_height,
    );
  }

  fn page_rows(&self) -> isize {
    (self.viewport_height / ITEM_HEIGHT).max(1) as isize
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    self.viewport_height = inner.height as usize;

    // Keep the viewport filled after the list shrinks or the terminal grows
    let max_scroll = window::max_scroll_top(ITEM_HEIGHT, self.viewport_height, self.row_count());
    self.scroll_top = self.scroll_top.min(max_scroll);

    if self.records().is_empty() && !self.loader.is_loading() {
      let content = match self.loader.error() {
        Some(error) => format!("Failed to load records: {}\n\nPress 'r' to retry.", error),
        None if !self.filter.value().is_empty() => "No records match the filter.".to_string(),
        None => "No records found.".to_string(),
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let visible = self.current_window();
    let items: Vec<ListItem> = visible.range().map(|index| self.row(index)).collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    // The slice starts at `start_index`, so selection is relative to it
    let mut list_state =
      ListState::default().with_selected(self.selected.checked_sub(visible.start_index));
    frame.render_stateful_widget(list, area, &mut list_state);

    let mut scrollbar_state = ScrollbarState::new(visible.total_height)
      .viewport_content_length(self.viewport_height)
      .position(visible.offset_y);
    frame.render_stateful_widget(
      Scrollbar::new(ScrollbarOrientation::VerticalRight),
      area.inner(Margin {
        vertical: 1,
        horizontal: 0,
      }),
      &mut scrollbar_state,
    );
  }

  fn title(&self) -> String {
    let count = self.records().len();
    let more = if self.loader.has_more() { "+" } else { "" };
    let filter = self.filter.value();

    let mut title = format!(" {} ({}{})", self.resource.name, count, more);
    if !filter.is_empty() {
      title.push_str(&format!(" [/{}]", truncate(filter, 24)));
    }
    if self.filter.pending() {
      title.push_str(" (typing...)");
    } else if self.loader.is_loading() {
      title.push_str(" (loading...)");
    }
    title.push(' ');
    title
  }

  fn row(&self, index: usize) -> ListItem<'static> {
    let Some(record) = self.records().get(index) else {
      return self.sentinel_row();
    };

    let mut spans = vec![Span::styled(
      column(&record.title(self.resource.title_field.as_deref()), TITLE_WIDTH),
      Style::default().fg(Color::Cyan),
    )];

    for field in &self.resource.columns {
      let text = record.field_text(field);
      let style = if field.eq_ignore_ascii_case("status") {
        Style::default().fg(status_color(&text))
      } else {
        Style::default()
      };
      spans.push(Span::raw(" "));
      spans.push(Span::styled(column(&text, FIELD_WIDTH), style));
    }

    ListItem::new(Line::from(spans))
  }

  fn sentinel_row(&self) -> ListItem<'static> {
    let (text, color) = match self.loader.error() {
      Some(error) => (
        format!("  failed to load more: {} (m to retry)", error),
        Color::Red,
      ),
      None => ("  loading more...".to_string(), Color::DarkGray),
    };
    ListItem::new(Line::from(Span::styled(text, Style::default().fg(color))))
  }

  // Key handling helpers for or_else chain pattern
  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.search.handle_key(key, self.filter.value()) {
      KeyResult::Handled => Some(ViewAction::None),
      KeyResult::Event(SearchEvent::Changed(text)) => {
        self.filter.set(text);
        Some(ViewAction::None)
      }
      KeyResult::Event(SearchEvent::Submitted(text)) => {
        self.filter.set(text);
        if self.filter.flush() {
          self.apply_filter();
        }
        Some(ViewAction::None)
      }
      KeyResult::NotHandled => None,
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
      KeyCode::PageDown => self.move_selection(self.page_rows()),
      KeyCode::Char('d') if ctrl => self.move_selection(self.page_rows()),
      KeyCode::PageUp => self.move_selection(-self.page_rows()),
      KeyCode::Char('u') if ctrl => self.move_selection(-self.page_rows()),
      KeyCode::Char('g') | KeyCode::Home => self.move_selection(isize::MIN),
      KeyCode::Char('G') | KeyCode::End => self.move_selection(isize::MAX),
      _ => return None,
    }
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        self.refresh();
        Some(ViewAction::None)
      }
      KeyCode::Char('m') => {
        self.loader.load_more();
        Some(ViewAction::None)
      }
      KeyCode::Enter => {
        let record = self.records().get(self.selected)?;
        Some(ViewAction::Push(Box::new(RecordDetailView::new(
          self.client.clone(),
          self.resource.clone(),
          record.clone(),
        ))))
      }
      KeyCode::Esc if !self.filter.value().is_empty() => {
        self.filter.set(String::new());
        if self.filter.flush() {
          self.apply_filter();
        }
        Some(ViewAction::None)
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for RecordListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    // Let search component render its overlay
    self.search.render_overlay(frame, area, self.filter.pending());
  }

  fn breadcrumb_label(&self) -> String {
    self.resource.name.clone()
  }

  fn resource(&self) -> Option<&str> {
    Some(self.loader.resource())
  }

  fn captures_input(&self) -> bool {
    self.search.is_active()
  }

  fn is_loading(&self) -> bool {
    self.loader.is_loading()
  }

  fn status(&self) -> Option<String> {
    self.loader.error().map(String::from)
  }

  fn tick(&mut self) {
    if self.filter.poll() {
      self.apply_filter();
    }
    if self.loader.poll() {
      // Refresh may have shortened the list
      self.selected = self.selected.min(self.records().len().saturating_sub(1));
    }
    self.check_prefetch();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "filter").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(25),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}

/// Loader for one table under one filter; the filter is part of the cache key
fn build_loader(
  client: &TableClient,
  resource: &ResourceConfig,
  filter: &str,
  settings: &LoadingConfig,
  cache: &SharedPageCache<Record>,
) -> IncrementalLoader<Record> {
  let table = resource.table().to_string();
  let key = if filter.is_empty() {
    table.clone()
  } else {
    format!("{}?filter={}", table, filter)
  };
  let filter = Some(filter.to_string()).filter(|f| !f.is_empty());
  let client = client.clone();

  IncrementalLoader::new(key, settings.loader(), cache.clone(), move |request, token| {
    let client = client.clone();
    let table = table.clone();
    let filter = filter.clone();
    async move {
      client
        .fetch_page(&table, filter.as_deref(), request, token)
        .await
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheKey;
  use std::time::Duration;

  fn resource() -> ResourceConfig {
    ResourceConfig {
      name: "campaigns".to_string(),
      table: Some("mkt_campaigns".to_string()),
      title_field: Some("Name".to_string()),
      columns: vec!["Status".to_string()],
      aliases: Vec::new(),
      description: None,
    }
  }

  fn record(id: usize) -> Record {
    Record {
      id: format!("rec{}", id),
      created: None,
      fields: Default::default(),
    }
  }

  /// View whose first pages are already cached, so no request leaves the process
  fn view_with_cached_pages(pages: usize, settings: LoadingConfig) -> RecordListView {
    let cache = SharedPageCache::new(settings.max_entries);
    for page in 0..pages {
      let start = page * settings.page_size;
      cache.put(
        CacheKey::new("mkt_campaigns", page, settings.page_size),
        (start..start + settings.page_size).map(record).collect(),
        Duration::from_secs(300),
      );
    }
    // Unroutable: any fetch that does start just stays in flight
    let client = TableClient::with_token("http://10.255.255.1:9/v1", String::new()).unwrap();
    RecordListView::new(client, resource(), settings, cache)
  }

  fn settings(page_size: usize) -> LoadingConfig {
    LoadingConfig {
      page_size,
      ..LoadingConfig::default()
    }
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[tokio::test]
  async fn test_first_page_served_from_cache() {
    let view = view_with_cached_pages(1, settings(20));
    assert_eq!(view.records().len(), 20);
    assert!(!view.loader.is_loading());
    assert_eq!(view.row_count(), 21);
  }

  #[tokio::test]
  async fn test_sentinel_in_view_prefetches_next_page() {
    let mut view = view_with_cached_pages(2, settings(20));
    view.viewport_height = 10;

    // Sentinel (row 20) is far below the window
    view.tick();
    assert_eq!(view.records().len(), 20);

    view.move_selection(isize::MAX);
    view.tick();
    assert_eq!(view.records().len(), 40);
    assert_eq!(view.loader.current_page(), Some(1));
  }

  #[tokio::test]
  async fn test_prefetch_fires_once_while_visible() {
    let mut view = view_with_cached_pages(1, settings(20));
    view.viewport_height = 30;

    // Page 1 is not cached: the fetch starts and stays in flight
    view.tick();
    assert!(view.loader.is_loading());
    view.tick();
    view.tick();
    assert!(view.loader.is_loading());
    assert_eq!(view.records().len(), 20);
  }

  #[tokio::test]
  async fn test_selection_scrolls_window() {
    let mut view = view_with_cached_pages(1, settings(20));
    view.viewport_height = 5;

    for _ in 0..7 {
      view.move_selection(1);
    }
    assert_eq!(view.selected, 7);
    assert_eq!(view.scroll_top, 3);
    assert_eq!(view.current_window().start_index, 3);

    view.move_selection(isize::MIN);
    assert_eq!(view.selected, 0);
    assert_eq!(view.scroll_top, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_filter_is_debounced() {
    let mut view = view_with_cached_pages(1, settings(20));
    view.handle_key(key(KeyCode::Char('/')));
    for c in "paused".chars() {
      view.handle_key(key(KeyCode::Char(c)));
      tokio::time::advance(Duration::from_millis(50)).await;
      view.tick();
    }
    // Still on the unfiltered loader
    assert_eq!(view.loader.resource(), "mkt_campaigns");

    tokio::time::advance(Duration::from_millis(300)).await;
    view.tick();
    assert_eq!(view.loader.resource(), "mkt_campaigns?filter=paused");
    assert!(view.loader.is_loading());
    assert!(view.records().is_empty());
  }

  #[tokio::test]
  async fn test_submit_applies_filter_immediately() {
    let mut view = view_with_cached_pages(1, settings(20));
    view.handle_key(key(KeyCode::Char('/')));
    view.handle_key(key(KeyCode::Char('x')));
    view.handle_key(key(KeyCode::Enter));

    assert_eq!(view.loader.resource(), "mkt_campaigns?filter=x");

    // Esc clears the filter, back onto the cached pages
    view.handle_key(key(KeyCode::Esc));
    assert_eq!(view.loader.resource(), "mkt_campaigns");
    assert_eq!(view.records().len(), 20);
  }

  #[tokio::test(start_paused = true)]
  async fn test_reverted_filter_keeps_loaded_pages_and_position() {
    let mut view = view_with_cached_pages(3, settings(20));
    view.loader.load_more();
    view.loader.load_more();
    view.move_selection(35);
    assert_eq!(view.records().len(), 60);

    view.handle_key(key(KeyCode::Char('/')));
    view.handle_key(key(KeyCode::Char('x')));
    view.handle_key(key(KeyCode::Backspace));
    tokio::time::advance(Duration::from_millis(400)).await;
    view.tick();

    assert_eq!(view.loader.resource(), "mkt_campaigns");
    assert_eq!(view.records().len(), 60);
    assert_eq!(view.selected, 35);
    assert!(!view.filter.pending());

    // Submitting the unchanged filter does not rebuild the loader either
    view.handle_key(key(KeyCode::Enter));
    assert_eq!(view.records().len(), 60);
    assert_eq!(view.selected, 35);
  }

  #[tokio::test]
  async fn test_enter_opens_detail() {
    let mut view = view_with_cached_pages(1, settings(20));
    view.move_selection(3);
    assert!(matches!(
      view.handle_key(key(KeyCode::Enter)),
      ViewAction::Push(_)
    ));
  }
}
