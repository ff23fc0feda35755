use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A view call returned an error or panicked.
    ViewFault,
    /// The line provider could not resolve a line.
    MissingLine,
    /// NoTargetFound, TargetMissingComponent or InvalidParameterCount.
    CommandRouting,
    /// A dispatched command's completion failed.
    CommandFault,
    /// No handler accepted the command; presentation stalls.
    UnknownCommand,
    ConsistencyViolation,
    StateMachineFault,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ViewFault => "view_fault",
            DiagnosticKind::MissingLine => "missing_line",
            DiagnosticKind::CommandRouting => "command_routing",
            DiagnosticKind::CommandFault => "command_fault",
            DiagnosticKind::UnknownCommand => "unknown_command",
            DiagnosticKind::ConsistencyViolation => "consistency_violation",
            DiagnosticKind::StateMachineFault => "state_machine_fault",
        }
    }

    /// Whether the diagnostic ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiagnosticKind::ConsistencyViolation | DiagnosticKind::StateMachineFault
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Name of the offending view, for view faults.
    #[serde(default)]
    pub view: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunnerEvent {
    #[serde(rename_all = "camelCase")]
    DialogueStarted {
        session_id: String,
        node: String,
        timestamp: i64,
    },
    #[serde(rename_all = "camelCase")]
    NodeStarted { session_id: String, node: String },
    #[serde(rename_all = "camelCase")]
    NodeCompleted { session_id: String, node: String },
    #[serde(rename_all = "camelCase")]
    UnhandledCommand { session_id: String, command: String },
    Diagnostic { diagnostic: Diagnostic },
    #[serde(rename_all = "camelCase")]
    DialogueCompleted { session_id: String, timestamp: i64 },
}

impl RunnerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RunnerEvent::DialogueStarted { .. } => "dialogue-started",
            RunnerEvent::NodeStarted { .. } => "node-started",
            RunnerEvent::NodeCompleted { .. } => "node-completed",
            RunnerEvent::UnhandledCommand { .. } => "unhandled-command",
            RunnerEvent::Diagnostic { .. } => "diagnostic",
            RunnerEvent::DialogueCompleted { .. } => "dialogue-completed",
        }
    }

    pub fn as_diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            RunnerEvent::Diagnostic { diagnostic } => Some(diagnostic),
            _ => None,
        }
    }
}
