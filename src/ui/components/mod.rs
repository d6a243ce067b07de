mod command_input;
mod input;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use search_input::{SearchEvent, SearchInput};

/// Outcome of offering a key to a component.
///
/// Views try their components first and fall through to their own bindings
/// on `NotHandled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed with nothing to report
  Handled,
  /// Consumed, and the parent has something to act on
  Event(T),
  NotHandled,
}
