//! Infrastructure layer - runner events, diagnostics and logging helpers

pub mod events;
pub mod logging;

pub use events::{Diagnostic, DiagnosticKind, EventEmitter, RunnerEvent};
