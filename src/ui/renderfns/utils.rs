use ratatui::prelude::Color;

/// Truncate a string to a maximum number of chars, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Pad or truncate to an exact column width
pub fn column(s: &str, width: usize) -> String {
  format!("{:<width$}", truncate(s, width), width = width)
}

/// Get the display color for a status-like field value
pub fn status_color(status: &str) -> Color {
  match status.to_lowercase().as_str() {
    "active" | "running" | "live" | "enabled" => Color::Green,
    "paused" | "pending" | "draft" | "scheduled" => Color::Yellow,
    "error" | "failed" | "disabled" | "removed" => Color::Red,
    _ => Color::White,
  }
}
