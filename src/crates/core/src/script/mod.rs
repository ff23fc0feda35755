//! Scripted dialogue
//!
//! A small YAML dialogue format plus a `DialogueStateMachine` that walks it. Used by the
//! CLI and as a reference implementation of the state machine contract.

pub mod machine;
pub mod program;

pub use machine::ScriptedDialogue;
pub use program::{ScriptLine, ScriptOption, ScriptProgram, ScriptStep};
