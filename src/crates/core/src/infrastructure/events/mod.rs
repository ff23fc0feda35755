//! Event system module
//!
//! Runner notifications and the diagnostic channel. Front ends subscribe through
//! `DialogueRunner::subscribe` and receive every event in emission order.

pub mod emitter;
pub mod types;

pub use emitter::EventEmitter;
pub use types::{Diagnostic, DiagnosticKind, RunnerEvent};
