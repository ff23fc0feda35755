// Parley Core Library - dialogue execution orchestration
// Layers: Util -> Infrastructure -> Dialogue/Line/Commands -> Runner

pub mod commands; // Command dispatch, built-in action registry
pub mod config; // Runner and front-end configuration
pub mod dialogue; // State machine contract and dialogue events
pub mod infrastructure; // Runner events, diagnostics, logging helpers
pub mod line; // Localised lines and line providers
pub mod runner; // Dialogue runner, sessions, cancellation, views
pub mod script; // YAML scripts and the scripted state machine
pub mod util; // Errors and small helpers

// Export main types
pub use util::errors::*;

pub use commands::{
    ActionRegistry, CommandContext, CommandDispatchResult, CommandDispatcher,
    UnhandledCommandHandler,
};
pub use config::{ParleyConfig, RunnerConfig};
pub use dialogue::{DialogueEvent, DialogueProject, DialogueStateMachine};
pub use infrastructure::{Diagnostic, DiagnosticKind, RunnerEvent};
pub use line::{DialogueOption, LineProvider, LocalizedLine, TableLineProvider};
pub use runner::{
    DialogueRunner, DialogueRunnerBuilder, DialogueView, LineCancellationToken, RunnerHandle,
    RunnerState,
};
pub use script::{ScriptProgram, ScriptedDialogue};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CORE_NAME: &str = "Parley Core";
