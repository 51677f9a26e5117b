// ── Live list machinery ──
//
// The list controller state machine and per-instance row selection.

mod controller;
mod selection;

pub use controller::{ListConfig, ListController, ListState, LoadPhase};
pub use selection::Selection;
