use super::types::{Diagnostic, DiagnosticKind, RunnerEvent};
use log::{debug, error, warn};
use tokio::sync::broadcast;

/// Broadcasts runner events to any number of subscribers.
///
/// Emitting never blocks and never fails the caller: with no subscribers the event is
/// dropped, and slow subscribers observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<RunnerEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunnerEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: RunnerEvent) {
        let event_name = event.name();
        if self.tx.send(event).is_err() {
            debug!("Runner event dropped, no subscribers: event_name={}", event_name);
        }
    }

    /// Logs a diagnostic and publishes it on the diagnostic channel.
    pub fn report(
        &self,
        kind: DiagnosticKind,
        session_id: Option<&str>,
        view: Option<&str>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        match (kind, view) {
            (DiagnosticKind::ViewFault, Some(view)) => {
                warn!("View fault: view={}, error={}", view, message)
            }
            (kind, _) if kind.is_fatal() => error!("{}: {}", kind.as_str(), message),
            (DiagnosticKind::CommandFault, _) => warn!("Command fault: {}", message),
            _ => error!("{}", message),
        }

        self.emit(RunnerEvent::Diagnostic {
            diagnostic: Diagnostic {
                kind,
                message,
                view: view.map(str::to_string),
                session_id: session_id.map(str::to_string),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        });
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(64)
    }
}
