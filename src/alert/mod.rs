/// Notification decision logic.
///
/// Submodules:
/// - `transitions` — the rain-state machine with first-run and debounce
///   rules, deciding when a signal change becomes a notification.

pub mod transitions;
