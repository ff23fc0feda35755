use crate::util::errors::ParleyResult;
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;

/// Completion of a successfully dispatched command; must settle before dialogue advances.
pub type CommandCompletion = BoxFuture<'static, ParleyResult<()>>;

pub enum CommandDispatchResult {
    Succeeded(CommandCompletion),
    NoTargetFound {
        target: String,
    },
    TargetMissingComponent {
        target: String,
        component: String,
    },
    InvalidParameterCount {
        expected: String,
        actual: usize,
    },
    CommandUnknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandDispatchStatus {
    Succeeded,
    NoTargetFound,
    TargetMissingComponent,
    InvalidParameterCount,
    CommandUnknown,
}

impl CommandDispatchResult {
    /// A succeeded result whose completion is already settled.
    pub fn completed() -> Self {
        Self::Succeeded(Box::pin(async { Ok(()) }))
    }

    pub fn status(&self) -> CommandDispatchStatus {
        match self {
            Self::Succeeded(_) => CommandDispatchStatus::Succeeded,
            Self::NoTargetFound { .. } => CommandDispatchStatus::NoTargetFound,
            Self::TargetMissingComponent { .. } => CommandDispatchStatus::TargetMissingComponent,
            Self::InvalidParameterCount { .. } => CommandDispatchStatus::InvalidParameterCount,
            Self::CommandUnknown => CommandDispatchStatus::CommandUnknown,
        }
    }
}

impl fmt::Debug for CommandDispatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded(_) => f.write_str("Succeeded(..)"),
            Self::NoTargetFound { target } => {
                f.debug_struct("NoTargetFound").field("target", target).finish()
            }
            Self::TargetMissingComponent { target, component } => f
                .debug_struct("TargetMissingComponent")
                .field("target", target)
                .field("component", component)
                .finish(),
            Self::InvalidParameterCount { expected, actual } => f
                .debug_struct("InvalidParameterCount")
                .field("expected", expected)
                .field("actual", actual)
                .finish(),
            Self::CommandUnknown => f.write_str("CommandUnknown"),
        }
    }
}
