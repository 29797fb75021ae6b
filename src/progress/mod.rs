//! Quest progress pipeline.

pub mod machine;
pub mod state;

pub use machine::{Effects, ProgressMachine, COMPLETION_DEBOUNCE};
pub use state::{ProgressSnapshot, ProgressState, Stage};
