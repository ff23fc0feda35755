use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Identifier the state machine assigns to each option of an option set.
pub type OptionId = usize;

/// A line as raised by the state machine, before localisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub id: String,
    #[serde(default)]
    pub substitutions: Vec<String>,
}

impl Line {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            substitutions: Vec::new(),
        }
    }

    pub fn with_substitutions(mut self, substitutions: Vec<String>) -> Self {
        self.substitutions = substitutions;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionItem {
    pub id: OptionId,
    pub line: Line,
    pub is_available: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSet {
    pub options: Vec<OptionItem>,
}

/// Raw command text, e.g. `walk Alice "the big door"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub text: String,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueEvent {
    Line(Line),
    Options(OptionSet),
    Command(Command),
    NodeStarted(String),
    NodeCompleted(String),
    /// Line ids the state machine is likely to need soon.
    PrepareForLines(Vec<String>),
    DialogueCompleted,
}

impl DialogueEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DialogueEvent::Line(_) => "line",
            DialogueEvent::Options(_) => "options",
            DialogueEvent::Command(_) => "command",
            DialogueEvent::NodeStarted(_) => "node_started",
            DialogueEvent::NodeCompleted(_) => "node_completed",
            DialogueEvent::PrepareForLines(_) => "prepare_for_lines",
            DialogueEvent::DialogueCompleted => "dialogue_completed",
        }
    }

    /// Events that hand content to the views and expect a `continue` afterwards.
    pub fn presents_content(&self) -> bool {
        matches!(
            self,
            DialogueEvent::Line(_) | DialogueEvent::Options(_) | DialogueEvent::Command(_)
        )
    }
}

pub type DialogueEventSender = mpsc::UnboundedSender<DialogueEvent>;
pub type DialogueEventReceiver = mpsc::UnboundedReceiver<DialogueEvent>;

pub fn dialogue_event_channel() -> (DialogueEventSender, DialogueEventReceiver) {
    mpsc::unbounded_channel()
}
