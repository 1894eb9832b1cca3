// Run state tracking across invocations

pub mod manager;
pub mod run_state;

pub use manager::{RunHandle, StateManager};
pub use run_state::{RunFlag, RunState};
