//! Windowed rendering math for long lists.
//!
//! Given a scroll offset and fixed item height, [`window`] decides which item
//! indices must actually be rendered and where the rendered slice sits inside
//! the full scroll extent. Units are whatever the caller measures heights in;
//! the terminal views use rows.

use std::ops::Range;

/// Default number of extra items rendered past the viewport.
pub const DEFAULT_OVERSCAN: usize = 2;

/// Inputs to the windowing calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowParams {
  pub scroll_top: usize,
  pub item_height: usize,
  pub container_height: usize,
  pub item_count: usize,
  pub overscan: usize,
}

impl WindowParams {
  pub fn new(
    scroll_top: usize,
    item_height: usize,
    container_height: usize,
    item_count: usize,
  ) -> Self {
    Self {
      scroll_top,
      item_height,
      container_height,
      item_count,
      overscan: DEFAULT_OVERSCAN,
    }
  }

  pub fn with_overscan(mut self, overscan: usize) -> Self {
    self.overscan = overscan;
    self
  }
}

/// The slice of a list that must be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowSpec {
  /// First index to render
  pub start_index: usize,
  /// One past the last index to render
  pub end_index: usize,
  /// Height of the whole list, used to size the scroll extent
  pub total_height: usize,
  /// Distance from the top of the list to `start_index`
  pub offset_y: usize,
  /// Items that fit in the container, plus overscan
  pub visible_count: usize,
}

impl WindowSpec {
  pub fn range(&self) -> Range<usize> {
    self.start_index..self.end_index
  }

  pub fn len(&self) -> usize {
    self.end_index - self.start_index
  }

  pub fn is_empty(&self) -> bool {
    self.start_index == self.end_index
  }

  pub fn contains(&self, index: usize) -> bool {
    self.range().contains(&index)
  }
}

/// Compute the rendered window. Pure; call on every scroll or resize.
///
/// A zero item or container height produces an empty window.
pub fn window(params: &WindowParams) -> WindowSpec {
  let WindowParams {
    scroll_top,
    item_height,
    container_height,
    item_count,
    overscan,
  } = *params;

  if item_height == 0 || container_height == 0 {
    return WindowSpec {
      total_height: item_count * item_height,
      ..WindowSpec::default()
    };
  }

  let visible_count = container_height.div_ceil(item_height) + overscan;
  let start_index = (scroll_top / item_height).min(item_count);
  let end_index = (start_index + visible_count).min(item_count);

  WindowSpec {
    start_index,
    end_index,
    total_height: item_count * item_height,
    offset_y: start_index * item_height,
    visible_count,
  }
}

/// Largest scroll offset that still fills the container.
pub fn max_scroll_top(item_height: usize, container_height: usize, item_count: usize) -> usize {
  (item_count * item_height).saturating_sub(container_height)
}

/// Adjust `scroll_top` by the minimum amount that brings `index` fully into
/// the container.
pub fn scroll_into_view(
  scroll_top: usize,
  index: usize,
  item_height: usize,
  container_height: usize,
) -> usize {
  let item_top = index * item_height;
  let item_bottom = item_top + item_height;

  if item_top < scroll_top {
    item_top
  } else if item_bottom > scroll_top + container_height {
    item_bottom.saturating_sub(container_height)
  } else {
    scroll_top
  }
}
