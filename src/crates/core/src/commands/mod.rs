//! Command dispatch
//!
//! The runner never interprets command text itself: it routes the raw string to a
//! `CommandDispatcher` and branches on the returned `CommandDispatchResult`.

pub mod registry;
pub mod result;
pub mod text;

pub use registry::{ActionRegistry, CommandInvocation, NamedTargets, ParameterCount, TargetResolver};
pub use result::{CommandCompletion, CommandDispatchResult, CommandDispatchStatus};
pub use text::split_command_text;

use crate::util::errors::ParleyResult;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Host information passed along with every dispatched command.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub session_id: String,
    /// Dialogue-level cancellation; long-running commands should observe it.
    pub cancellation: CancellationToken,
}

impl CommandContext {
    pub fn new(session_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            session_id: session_id.into(),
            cancellation,
        }
    }
}

pub trait CommandDispatcher: Send + Sync {
    /// Routes one command. Exactly one result is produced per call.
    fn dispatch(&self, command_text: &str, context: &CommandContext) -> CommandDispatchResult;
}

/// Last-chance handler for commands no dispatcher recognised.
#[async_trait]
pub trait UnhandledCommandHandler: Send + Sync {
    /// Returns `Ok(true)` when the command was handled and dialogue may continue.
    async fn handle_command(&self, command_text: &str, context: &CommandContext)
        -> ParleyResult<bool>;
}
