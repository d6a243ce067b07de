pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let shortcuts = app.current_view().map(|v| v.shortcuts()).unwrap_or_default();
  let resource = app.current_view().and_then(|v| v.resource());
  let loading = app.current_view().is_some_and(|v| v.is_loading());
  renderfns::draw_header(frame, chunks[0], app.title(), resource, loading, &shortcuts);

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }

  // Command overlay is drawn on top of whichever view is current
  app.command_input().render_overlay(frame, chunks[1]);

  let status = app.current_view().and_then(|v| v.status());
  renderfns::draw_footer(frame, chunks[2], &app.view_breadcrumb(), status.as_deref());
}
