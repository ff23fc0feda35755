use super::event::{DialogueEventSender, OptionId};
use crate::util::errors::ParleyResult;
use std::sync::Arc;

/// Control surface of the external dialogue state machine.
///
/// The machine raises its events on the sender passed to `attach_event_sink`; the runner
/// consumes them one at a time and only calls `continue_dialogue` once the previous event
/// has settled. Implementations must:
/// - raise nothing between events other than in response to `continue_dialogue`
///   (node boundaries and prepare-for-lines may precede the content they announce);
/// - raise `DialogueEvent::DialogueCompleted` exactly once when the dialogue ends, including
///   when `stop` is called on an active dialogue.
pub trait DialogueStateMachine: Send + Sync + 'static {
    /// Compiled program type, opaque to the runner.
    type Program: Send + Sync + 'static;

    fn attach_event_sink(&self, sink: DialogueEventSender);

    fn set_program(&self, program: Arc<Self::Program>) -> ParleyResult<()>;

    /// Positions the machine at the start of `node_name` and makes it active.
    fn set_node(&self, node_name: &str) -> ParleyResult<()>;

    fn continue_dialogue(&self) -> ParleyResult<()>;

    fn set_selected_option(&self, option_id: OptionId) -> ParleyResult<()>;

    fn stop(&self);

    fn is_active(&self) -> bool;
}
