use super::LocalizedLine;
use crate::dialogue::Line;
use crate::util::errors::ParleyResult;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Resolves lines raised by the state machine into presentable content.
#[async_trait]
pub trait LineProvider: Send + Sync {
    /// Returns `None` when the line cannot be resolved.
    async fn get_localized_line(
        &self,
        line: &Line,
        cancellation: &CancellationToken,
    ) -> Option<LocalizedLine>;

    /// Best-effort warm-up for lines that are likely to be requested soon.
    async fn prepare_for_lines(
        &self,
        _line_ids: Vec<String>,
        _cancellation: CancellationToken,
    ) -> ParleyResult<()> {
        Ok(())
    }
}
