//! Dialogue state machine contract
//!
//! The orchestrator consumes an external state machine through `DialogueStateMachine`
//! and receives its events over a single-consumer channel.

pub mod event;
pub mod machine;
pub mod project;

pub use event::{
    dialogue_event_channel, Command, DialogueEvent, DialogueEventReceiver, DialogueEventSender,
    Line, OptionId, OptionItem, OptionSet,
};
pub use machine::DialogueStateMachine;
pub use project::DialogueProject;
