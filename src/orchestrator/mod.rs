//! Session orchestration.
//!
//! The controller owns the single `AppState` instance, applies the reducer in
//! response to UI commands and timer/task completions, and emits events for
//! presentation layers. Timers and the outstanding AI call live here so the
//! reducer stays pure.

mod controller;

pub(crate) use controller::{run_controller, SessionDeps, UiCommand};
