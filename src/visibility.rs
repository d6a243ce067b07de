//! Edge-triggered visibility callbacks, used to prefetch the next page when
//! the "loading more" sentinel scrolls into view.

use std::fmt;

use crate::window::WindowSpec;

/// Fires a callback when an observed element goes from hidden to visible.
///
/// The trigger knows nothing about how visibility is measured; feed it the
/// result of whatever region test the caller has (see [`sentinel_visible`]).
pub struct VisibilityTrigger<F: FnMut()> {
  callback: Option<F>,
  was_visible: bool,
}

impl<F: FnMut()> VisibilityTrigger<F> {
  pub fn new(callback: F) -> Self {
    Self {
      callback: Some(callback),
      was_visible: false,
    }
  }

  /// Report the element's current visibility.
  ///
  /// Returns `true` if the callback fired.
  pub fn observe(&mut self, visible: bool) -> bool {
    let entered = visible && !self.was_visible;
    self.was_visible = visible;

    match &mut self.callback {
      Some(callback) if entered => {
        callback();
        true
      }
      _ => false,
    }
  }

  /// Forget the last observation so the next visible report fires again.
  pub fn reset(&mut self) {
    self.was_visible = false;
  }

  /// Stop observing. The callback is dropped and never invoked again.
  pub fn disconnect(&mut self) {
    self.callback = None;
  }

  pub fn is_connected(&self) -> bool {
    self.callback.is_some()
  }
}

impl<F: FnMut()> fmt::Debug for VisibilityTrigger<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VisibilityTrigger")
      .field("connected", &self.is_connected())
      .field("was_visible", &self.was_visible)
      .finish()
  }
}

/// Whether the row at `sentinel_index` falls inside the rendered window.
///
/// The window's overscan acts as the prefetch margin: the sentinel counts as
/// visible slightly before it reaches the viewport.
pub fn sentinel_visible(window: &WindowSpec, sentinel_index: usize) -> bool {
  window.contains(sentinel_index)
}
