use super::cancellation::LineCancellationToken;
use crate::dialogue::OptionId;
use crate::line::{DialogueOption, LocalizedLine};
use crate::util::errors::ParleyResult;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A presentation component driven by the runner.
///
/// Every registered view receives every event concurrently with its siblings. Views must
/// honour cancellation: the runner signals and then waits, it never aborts a view, so a
/// view that ignores its tokens stalls the dialogue.
#[async_trait]
pub trait DialogueView: Send + Sync {
    /// Name used when reporting faults.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn on_dialogue_started(&self) -> ParleyResult<()> {
        Ok(())
    }

    /// Presents one line, returning when the view is done with it.
    async fn run_line(&self, line: &LocalizedLine, token: &LineCancellationToken)
        -> ParleyResult<()>;

    /// Presents an option set. Return `Some(id)` to choose an option, or `None` when this
    /// view does not choose (for example because `cancellation` fired).
    async fn run_options(
        &self,
        options: &[DialogueOption],
        cancellation: &CancellationToken,
    ) -> ParleyResult<Option<OptionId>>;

    async fn on_dialogue_complete(&self) -> ParleyResult<()> {
        Ok(())
    }
}
