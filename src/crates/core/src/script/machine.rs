use super::program::{ScriptOption, ScriptProgram, ScriptStep};
use crate::dialogue::{
    Command, DialogueEvent, DialogueEventSender, DialogueStateMachine, Line, OptionId, OptionItem,
    OptionSet,
};
use crate::util::errors::{ParleyError, ParleyResult};
use crate::util::lock;
use log::{debug, trace};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MachineState {
    sink: Option<DialogueEventSender>,
    program: Option<Arc<ScriptProgram>>,
    node: String,
    position: usize,
    active: bool,
    node_entered: bool,
    pending_options: Option<Vec<ScriptOption>>,
    selected: Option<OptionId>,
}

impl MachineState {
    fn emit(&self, event: DialogueEvent) {
        let Some(sink) = self.sink.as_ref() else {
            trace!("No event sink attached, dropping event: event={}", event.kind());
            return;
        };
        if sink.send(event).is_err() {
            debug!("Dialogue event receiver is gone");
        }
    }

    fn enter_node(&mut self, node: String) {
        self.node = node;
        self.position = 0;
        self.node_entered = false;
    }

    fn finish(&mut self) {
        self.active = false;
        self.pending_options = None;
        self.selected = None;
        self.emit(DialogueEvent::DialogueCompleted);
    }
}

/// Walks a `ScriptProgram` one step per `continue_dialogue`.
///
/// Node entry raises `NodeStarted` followed by `PrepareForLines` for the node's lines;
/// leaving a node by jump or by running off its end raises `NodeCompleted`. Running off
/// the end of a node ends the dialogue.
#[derive(Default)]
pub struct ScriptedDialogue {
    state: Mutex<MachineState>,
}

impl ScriptedDialogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_node(&self) -> Option<String> {
        let state = lock(&self.state);
        state.active.then(|| state.node.clone())
    }
}

impl DialogueStateMachine for ScriptedDialogue {
    type Program = ScriptProgram;

    fn attach_event_sink(&self, sink: DialogueEventSender) {
        lock(&self.state).sink = Some(sink);
    }

    fn set_program(&self, program: Arc<ScriptProgram>) -> ParleyResult<()> {
        let mut state = lock(&self.state);
        if state.active {
            return Err(ParleyError::invalid_state(
                "Can't replace the program of an active dialogue",
            ));
        }
        state.program = Some(program);
        Ok(())
    }

    fn set_node(&self, node_name: &str) -> ParleyResult<()> {
        let mut state = lock(&self.state);
        let Some(program) = state.program.as_ref() else {
            return Err(ParleyError::invalid_state("No program has been set"));
        };
        if program.node(node_name).is_none() {
            return Err(ParleyError::NotFound(format!(
                "No node named '{}' in the program",
                node_name
            )));
        }

        state.enter_node(node_name.to_string());
        state.active = true;
        state.pending_options = None;
        state.selected = None;
        Ok(())
    }

    fn continue_dialogue(&self) -> ParleyResult<()> {
        let mut state = lock(&self.state);
        if !state.active {
            return Err(ParleyError::invalid_state(
                "Can't continue dialogue, because it is not running",
            ));
        }
        let Some(program) = state.program.clone() else {
            return Err(ParleyError::invalid_state("No program has been set"));
        };

        // Nodes entered by this call; re-entering one before anything is presented loops.
        let mut entered: Vec<String> = Vec::new();
        if let Some(options) = state.pending_options.take() {
            let Some(selected) = state.selected.take() else {
                state.pending_options = Some(options);
                return Err(ParleyError::state_machine(
                    "Can't continue dialogue while waiting for an option selection",
                ));
            };
            if let Some(target) = options.get(selected).and_then(|o| o.jump.clone()) {
                let node = state.node.clone();
                state.emit(DialogueEvent::NodeCompleted(node));
                entered.push(target.clone());
                state.enter_node(target);
            }
        }

        loop {
            let node = state.node.clone();
            if !state.node_entered {
                state.node_entered = true;
                state.emit(DialogueEvent::NodeStarted(node.clone()));
                state.emit(DialogueEvent::PrepareForLines(program.node_line_ids(&node)));
            }

            let Some(steps) = program.node(&node) else {
                return Err(ParleyError::NotFound(format!(
                    "No node named '{}' in the program",
                    node
                )));
            };
            let Some(step) = steps.get(state.position).cloned() else {
                state.emit(DialogueEvent::NodeCompleted(node));
                state.finish();
                return Ok(());
            };
            state.position += 1;

            match step {
                ScriptStep::Line(line) => {
                    state.emit(DialogueEvent::Line(Line::new(line.id)));
                    return Ok(());
                }
                ScriptStep::Command(text) => {
                    state.emit(DialogueEvent::Command(Command::new(text)));
                    return Ok(());
                }
                ScriptStep::Options(options) => {
                    let items = options
                        .iter()
                        .enumerate()
                        .map(|(id, option)| OptionItem {
                            id,
                            line: Line::new(option.id.clone()),
                            is_available: option.available,
                        })
                        .collect();
                    state.pending_options = Some(options);
                    state.emit(DialogueEvent::Options(OptionSet { options: items }));
                    return Ok(());
                }
                ScriptStep::Jump(target) => {
                    if entered.contains(&target) {
                        return Err(ParleyError::Script(format!(
                            "node '{}' jumps back to '{}' without presenting anything",
                            node, target
                        )));
                    }
                    state.emit(DialogueEvent::NodeCompleted(node));
                    entered.push(target.clone());
                    state.enter_node(target);
                }
            }
        }
    }

    fn set_selected_option(&self, option_id: OptionId) -> ParleyResult<()> {
        let mut state = lock(&self.state);
        let checked = match state.pending_options.as_ref().map(|options| options.get(option_id)) {
            None => Err(ParleyError::invalid_state(
                "Can't select an option, because none are being offered",
            )),
            Some(None) => Err(ParleyError::validation(format!(
                "Option {} is not part of the current option set",
                option_id
            ))),
            Some(Some(option)) if !option.available => Err(ParleyError::validation(format!(
                "Option {} ({}) is not available",
                option_id, option.id
            ))),
            Some(Some(_)) => Ok(()),
        };
        checked?;
        state.selected = Some(option_id);
        Ok(())
    }

    fn stop(&self) {
        let mut state = lock(&self.state);
        if state.active {
            debug!("Stopping scripted dialogue: node={}", state.node);
            state.finish();
        }
    }

    fn is_active(&self) -> bool {
        lock(&self.state).active
    }
}
