use super::cancellation::{UnitCancellation, UnitKind};
use crate::util::lock;
use log::{debug, warn};
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// One run of the state machine, from `start_dialogue` to dialogue completion.
///
/// Holds the dialogue-level cancellation token and at most one current unit.
#[derive(Debug)]
pub struct Session {
    id: String,
    node: String,
    cancellation: CancellationToken,
    current_unit: Mutex<Option<Arc<UnitCancellation>>>,
    started_at_ms: i64,
}

impl Session {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            id: format!("dialogue-{}", uuid::Uuid::new_v4()),
            node: node.into(),
            cancellation: CancellationToken::new(),
            current_unit: Mutex::new(None),
            started_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Node the session was started at.
    pub fn start_node(&self) -> &str {
        &self.node
    }

    pub fn started_at_ms(&self) -> i64 {
        self.started_at_ms
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancels the current unit, then the whole dialogue.
    pub fn cancel(&self) {
        if let Some(unit) = lock(&self.current_unit).as_ref() {
            unit.cancel_next();
        }
        self.cancellation.cancel();
    }

    /// Opens the cancellation scope for the next unit. The scope is released when the
    /// returned guard drops.
    pub(crate) fn begin_unit(&self, kind: UnitKind) -> UnitGuard<'_> {
        let unit = Arc::new(UnitCancellation::new(kind, &self.cancellation));
        let previous = lock(&self.current_unit).replace(unit.clone());
        if let Some(previous) = previous {
            warn!(
                "Replacing unreleased unit cancellation: session_id={}, previous_kind={:?}",
                self.id,
                previous.kind()
            );
        }
        UnitGuard {
            session: self,
            unit,
        }
    }

    pub fn current_unit_kind(&self) -> Option<UnitKind> {
        lock(&self.current_unit).as_ref().map(|unit| unit.kind())
    }

    /// Drops any unit left behind; used when the dialogue completes.
    pub(crate) fn clear_unit(&self) {
        if lock(&self.current_unit).take().is_some() {
            debug!("Released leftover unit cancellation: session_id={}", self.id);
        }
    }

    /// Asks views to stop presenting the current line. Returns false when no line is
    /// being presented.
    pub fn request_next_line(&self) -> bool {
        self.with_line_unit(UnitCancellation::cancel_next)
    }

    /// Asks views to hurry the current line. Returns false when no line is being presented.
    pub fn request_hurry_up(&self) -> bool {
        self.with_line_unit(UnitCancellation::cancel_hurry)
    }

    fn with_line_unit(&self, signal: impl FnOnce(&UnitCancellation)) -> bool {
        match lock(&self.current_unit).as_deref() {
            Some(unit) if unit.kind() == UnitKind::Line => {
                signal(unit);
                true
            }
            _ => false,
        }
    }

    fn release_unit(&self, unit: &Arc<UnitCancellation>) {
        let mut slot = lock(&self.current_unit);
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, unit)) {
            *slot = None;
        }
    }
}

/// Owns the current unit for the duration of one line or option set.
pub(crate) struct UnitGuard<'a> {
    session: &'a Session,
    unit: Arc<UnitCancellation>,
}

impl Deref for UnitGuard<'_> {
    type Target = UnitCancellation;

    fn deref(&self) -> &Self::Target {
        &self.unit
    }
}

impl Drop for UnitGuard<'_> {
    fn drop(&mut self) {
        self.session.release_unit(&self.unit);
    }
}
