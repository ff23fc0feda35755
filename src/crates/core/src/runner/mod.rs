//! Dialogue runner
//!
//! Coordinates a dialogue state machine, a line provider, a command dispatcher and any
//! number of views for one dialogue at a time.

pub mod cancellation;
pub mod dialogue_runner;
mod dispatcher;
pub mod session;
pub mod view;

pub use cancellation::{LineCancellationToken, UnitCancellation, UnitKind};
pub use dialogue_runner::{DialogueRunner, DialogueRunnerBuilder, RunnerHandle};
pub use session::Session;
pub use view::DialogueView;

use serde::{Deserialize, Serialize};

/// Lifecycle of a runner. Only `Idle` accepts `start_dialogue` and `set_project`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Idle,
    Running,
    /// Stop was requested; waiting for the state machine to report completion.
    Cancelling,
}

impl RunnerState {
    pub fn is_running(&self) -> bool {
        !matches!(self, RunnerState::Idle)
    }
}
