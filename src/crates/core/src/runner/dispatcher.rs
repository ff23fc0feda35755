//! Fan-out / fan-in of dialogue events to the registered views.
//!
//! Every view call runs as its own task. Lines and lifecycle notifications are joined
//! (all views must finish); option sets are raced (first selection wins, the rest are
//! cancelled and still joined).

use super::cancellation::UnitKind;
use super::session::Session;
use super::view::DialogueView;
use crate::commands::{
    split_command_text, CommandContext, CommandDispatchResult, CommandDispatcher,
    UnhandledCommandHandler,
};
use crate::config::RunnerConfig;
use crate::dialogue::{Command, DialogueEvent, DialogueStateMachine, Line, OptionId, OptionSet};
use crate::infrastructure::events::{DiagnosticKind, EventEmitter, RunnerEvent};
use crate::line::{DialogueOption, LineProvider, LocalizedLine};
use crate::util::errors::{ParleyError, ParleyResult};
use futures::future::join_all;
use log::{debug, warn};
use std::any::Any;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::task::{JoinError, JoinHandle};

/// Collaborators shared by every session of a runner.
pub(crate) struct RunnerServices {
    pub line_provider: Arc<dyn LineProvider>,
    pub commands: Arc<dyn CommandDispatcher>,
    pub unhandled_commands: Option<Arc<dyn UnhandledCommandHandler>>,
    pub config: RunnerConfig,
    pub emitter: EventEmitter,
}

/// What the state machine should do once an event has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Advance {
    Continue,
    Hold,
}

struct ViewCall<T> {
    view: String,
    handle: JoinHandle<ParleyResult<T>>,
}

#[derive(Debug, Clone)]
struct Selection {
    view: String,
    option_id: OptionId,
}

pub(crate) struct EventDispatcher<D: DialogueStateMachine> {
    dialogue: Arc<D>,
    services: Arc<RunnerServices>,
    session: Arc<Session>,
    views: Vec<Option<Arc<dyn DialogueView>>>,
}

impl<D: DialogueStateMachine> EventDispatcher<D> {
    pub(crate) fn new(
        dialogue: Arc<D>,
        services: Arc<RunnerServices>,
        session: Arc<Session>,
        views: Vec<Option<Arc<dyn DialogueView>>>,
    ) -> Self {
        Self {
            dialogue,
            services,
            session,
            views,
        }
    }

    pub(crate) async fn dispatch(&self, event: DialogueEvent) -> ParleyResult<Advance> {
        debug!(
            "Dispatching dialogue event: session_id={}, event={}",
            self.session.id(),
            event.kind()
        );
        match event {
            DialogueEvent::Line(line) => Ok(self.handle_line(line).await),
            DialogueEvent::Options(options) => self.handle_options(options).await,
            DialogueEvent::Command(command) => Ok(self.handle_command(command).await),
            DialogueEvent::NodeStarted(node) => {
                self.services.emitter.emit(RunnerEvent::NodeStarted {
                    session_id: self.session.id().to_string(),
                    node,
                });
                Ok(Advance::Hold)
            }
            DialogueEvent::NodeCompleted(node) => {
                self.services.emitter.emit(RunnerEvent::NodeCompleted {
                    session_id: self.session.id().to_string(),
                    node,
                });
                Ok(Advance::Hold)
            }
            DialogueEvent::PrepareForLines(line_ids) => {
                self.prepare_for_lines(line_ids);
                Ok(Advance::Hold)
            }
            DialogueEvent::DialogueCompleted => {
                self.handle_dialogue_complete().await;
                Ok(Advance::Hold)
            }
        }
    }

    pub(crate) async fn handle_dialogue_started(&self) -> Advance {
        let calls =
            self.spawn_for_each_view(|view| async move { view.on_dialogue_started().await });
        self.join_views("on_dialogue_started", calls).await;
        self.advance_unless_cancelled()
    }

    pub(crate) async fn handle_dialogue_complete(&self) {
        self.session.clear_unit();
        let calls =
            self.spawn_for_each_view(|view| async move { view.on_dialogue_complete().await });
        self.join_views("on_dialogue_complete", calls).await;
    }

    async fn handle_line(&self, line: Line) -> Advance {
        let localized = self
            .services
            .line_provider
            .get_localized_line(&line, self.session.cancellation_token())
            .await;

        match localized {
            Some(localized) => self.run_localized_line(localized).await,
            None => self.report(
                DiagnosticKind::MissingLine,
                None,
                format!("Failed to get a localised line for {}", line.id),
            ),
        }
        self.advance_unless_cancelled()
    }

    async fn run_localized_line(&self, line: LocalizedLine) {
        let line = Arc::new(line);
        let unit = self.session.begin_unit(UnitKind::Line);
        let token = unit.line_token();

        let calls = self.spawn_for_each_view(|view| {
            let line = line.clone();
            let token = token.clone();
            async move { view.run_line(&line, &token).await }
        });
        self.join_views("run_line", calls).await;
    }

    async fn handle_options(&self, option_set: OptionSet) -> ParleyResult<Advance> {
        let options = Arc::new(self.localize_options(&option_set).await);
        let selection = {
            let unit = self.session.begin_unit(UnitKind::Options);
            let cancellation = unit.option_token();
            let selection: Arc<OnceLock<Selection>> = Arc::new(OnceLock::new());

            let calls = self.spawn_for_each_view(|view| {
                let options = options.clone();
                let cancellation = cancellation.clone();
                let selection = selection.clone();
                async move {
                    let Some(option_id) = view.run_options(&options, &cancellation).await? else {
                        return Ok(());
                    };
                    if !options.iter().any(|option| option.id == option_id) {
                        return Err(ParleyError::view(format!(
                            "selected option {} which was not offered",
                            option_id
                        )));
                    }
                    let claimed = selection
                        .set(Selection {
                            view: view.name().to_string(),
                            option_id,
                        })
                        .is_ok();
                    if claimed {
                        cancellation.cancel();
                    } else {
                        debug!(
                            "Discarding late option selection: view={}, option_id={}",
                            view.name(),
                            option_id
                        );
                    }
                    Ok(())
                }
            });
            self.join_views("run_options", calls).await;
            selection.get().cloned()
        };

        if self.session.is_cancelled() {
            debug!(
                "Dialogue cancelled during option selection: session_id={}",
                self.session.id()
            );
            return Ok(Advance::Hold);
        }
        let Some(selected) = selection else {
            return Err(ParleyError::ConsistencyViolation(
                "No dialogue view returned an option selection".to_string(),
            ));
        };

        debug!(
            "Option selected: session_id={}, view={}, option_id={}",
            self.session.id(),
            selected.view,
            selected.option_id
        );
        if let Err(e) = self.dialogue.set_selected_option(selected.option_id) {
            if self.session.is_cancelled() {
                debug!(
                    "Option selection refused after stop: session_id={}, error={}",
                    self.session.id(),
                    e
                );
                return Ok(Advance::Hold);
            }
            return Err(ParleyError::state_machine(format!(
                "Failed to set selected option {}: {}",
                selected.option_id, e
            )));
        }

        if self.services.config.run_selected_option_as_line {
            if let Some(option) = options.iter().find(|o| o.id == selected.option_id) {
                self.run_localized_line(option.line.clone()).await;
            }
        }
        Ok(self.advance_unless_cancelled())
    }

    /// Resolves every option's text before any view sees the set.
    async fn localize_options(&self, option_set: &OptionSet) -> Vec<DialogueOption> {
        let mut localized = Vec::with_capacity(option_set.options.len());
        for (idx, item) in option_set.options.iter().enumerate() {
            let line = match self
                .services
                .line_provider
                .get_localized_line(&item.line, self.session.cancellation_token())
                .await
            {
                Some(line) => line,
                None => {
                    self.report(
                        DiagnosticKind::MissingLine,
                        None,
                        format!(
                            "Failed to get a localised line for line {} (option {})",
                            item.line.id,
                            idx + 1
                        ),
                    );
                    LocalizedLine::missing(item.line.id.clone())
                }
            };
            localized.push(DialogueOption {
                id: item.id,
                text_id: item.line.id.clone(),
                line,
                is_available: item.is_available,
            });
        }
        localized
    }

    async fn handle_command(&self, command: Command) -> Advance {
        let context = CommandContext::new(
            self.session.id(),
            self.session.cancellation_token().clone(),
        );
        let parts = split_command_text(&command.text);
        let name = parts.first().map(String::as_str).unwrap_or_default();

        match self.services.commands.dispatch(&command.text, &context) {
            CommandDispatchResult::Succeeded(completion) => {
                let fault = match tokio::spawn(completion).await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(join_error) => Some(describe_join_error(join_error)),
                };
                if let Some(fault) = fault {
                    self.report(
                        DiagnosticKind::CommandFault,
                        None,
                        format!("Command {} failed: {}", name, fault),
                    );
                }
            }
            CommandDispatchResult::NoTargetFound { target } => self.report(
                DiagnosticKind::CommandRouting,
                None,
                format!(
                    "Can't call command {}: failed to find a target named {}",
                    name, target
                ),
            ),
            CommandDispatchResult::TargetMissingComponent { target, component } => self.report(
                DiagnosticKind::CommandRouting,
                None,
                format!(
                    "Can't call command {}, because {} doesn't have the correct component ({})",
                    name, target, component
                ),
            ),
            CommandDispatchResult::InvalidParameterCount { expected, actual } => self.report(
                DiagnosticKind::CommandRouting,
                None,
                format!(
                    "Can't call command {}: incorrect number of parameters (expected {}, got {})",
                    name, expected, actual
                ),
            ),
            CommandDispatchResult::CommandUnknown => {
                if !self.run_unhandled_command(&command, &context).await {
                    self.report(
                        DiagnosticKind::UnknownCommand,
                        None,
                        format!(
                            "No command \"{}\" was found. Register it with the command \
                             dispatcher or handle it in an unhandled-command handler",
                            name
                        ),
                    );
                    return Advance::Hold;
                }
            }
        }
        self.advance_unless_cancelled()
    }

    /// Offers an unknown command to the fallback handler. Returns true if it was handled.
    async fn run_unhandled_command(&self, command: &Command, context: &CommandContext) -> bool {
        let Some(handler) = self.services.unhandled_commands.as_ref() else {
            return false;
        };
        self.services.emitter.emit(RunnerEvent::UnhandledCommand {
            session_id: self.session.id().to_string(),
            command: command.text.clone(),
        });

        let handler = handler.clone();
        let text = command.text.clone();
        let context = context.clone();
        let outcome =
            tokio::spawn(async move { handler.handle_command(&text, &context).await }).await;

        match outcome {
            Ok(Ok(handled)) => handled,
            Ok(Err(e)) => {
                warn!(
                    "Unhandled-command handler failed: command={}, error={}",
                    command.text, e
                );
                false
            }
            Err(join_error) => {
                warn!(
                    "Unhandled-command handler {}: command={}",
                    describe_join_error(join_error),
                    command.text
                );
                false
            }
        }
    }

    fn prepare_for_lines(&self, line_ids: Vec<String>) {
        let provider = self.services.line_provider.clone();
        let cancellation = self.session.cancellation_token().clone();
        let count = line_ids.len();
        tokio::spawn(async move {
            if let Err(e) = provider.prepare_for_lines(line_ids, cancellation).await {
                warn!("Failed to prepare lines: count={}, error={}", count, e);
            }
        });
    }

    fn advance_unless_cancelled(&self) -> Advance {
        if self.session.is_cancelled() {
            Advance::Hold
        } else {
            Advance::Continue
        }
    }

    fn spawn_for_each_view<T, F, Fut>(&self, call: F) -> Vec<ViewCall<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn DialogueView>) -> Fut,
        Fut: Future<Output = ParleyResult<T>> + Send + 'static,
    {
        self.views
            .iter()
            .flatten()
            .map(|view| ViewCall {
                view: view.name().to_string(),
                handle: tokio::spawn(call(view.clone())),
            })
            .collect()
    }

    /// Waits for every view call. Faults are reported per view and never abort siblings.
    async fn join_views<T>(&self, operation: &str, calls: Vec<ViewCall<T>>) -> Vec<T> {
        let outcomes = join_all(calls.into_iter().map(|ViewCall { view, handle }| async move {
            (view, handle.await)
        }))
        .await;

        let mut values = Vec::with_capacity(outcomes.len());
        for (view, outcome) in outcomes {
            match outcome {
                Ok(Ok(value)) => values.push(value),
                Ok(Err(e)) => self.report(
                    DiagnosticKind::ViewFault,
                    Some(&view),
                    format!("{} failed: {}", operation, e),
                ),
                Err(join_error) => self.report(
                    DiagnosticKind::ViewFault,
                    Some(&view),
                    format!("{} {}", operation, describe_join_error(join_error)),
                ),
            }
        }
        values
    }

    fn report(&self, kind: DiagnosticKind, view: Option<&str>, message: String) {
        self.services
            .emitter
            .report(kind, Some(self.session.id()), view, message);
    }
}

fn describe_join_error(error: JoinError) -> String {
    if !error.is_panic() {
        return "was cancelled".to_string();
    }
    let payload: Box<dyn Any + Send> = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("panicked: {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ActionRegistry;
    use crate::dialogue::{DialogueEventSender, OptionItem};
    use crate::runner::cancellation::LineCancellationToken;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct AcceptingDialogue {
        selected: Mutex<Vec<OptionId>>,
    }

    impl DialogueStateMachine for AcceptingDialogue {
        type Program = ();

        fn attach_event_sink(&self, _sink: DialogueEventSender) {}

        fn set_program(&self, _program: Arc<()>) -> ParleyResult<()> {
            Ok(())
        }

        fn set_node(&self, _node_name: &str) -> ParleyResult<()> {
            Ok(())
        }

        fn continue_dialogue(&self) -> ParleyResult<()> {
            Ok(())
        }

        fn set_selected_option(&self, option_id: OptionId) -> ParleyResult<()> {
            self.selected.lock().unwrap().push(option_id);
            Ok(())
        }

        fn stop(&self) {}

        fn is_active(&self) -> bool {
            true
        }
    }

    /// Records which unit was open whenever a line was resolved or options were shown.
    struct UnitWatcher {
        session: Arc<Session>,
        seen: Mutex<Vec<(&'static str, Option<UnitKind>)>>,
    }

    impl UnitWatcher {
        fn note(&self, call: &'static str) {
            let kind = self.session.current_unit_kind();
            self.seen.lock().unwrap().push((call, kind));
        }
    }

    #[async_trait]
    impl LineProvider for UnitWatcher {
        async fn get_localized_line(
            &self,
            line: &Line,
            _cancellation: &CancellationToken,
        ) -> Option<LocalizedLine> {
            self.note("localize");
            Some(LocalizedLine::new(line.id.clone(), line.id.clone()))
        }
    }

    #[async_trait]
    impl DialogueView for UnitWatcher {
        async fn run_line(
            &self,
            _line: &LocalizedLine,
            _token: &LineCancellationToken,
        ) -> ParleyResult<()> {
            Ok(())
        }

        async fn run_options(
            &self,
            options: &[DialogueOption],
            _cancellation: &CancellationToken,
        ) -> ParleyResult<Option<OptionId>> {
            self.note("run_options");
            Ok(options.last().map(|option| option.id))
        }
    }

    #[tokio::test]
    async fn options_are_localized_before_their_unit_opens() {
        let session = Arc::new(Session::new("Start"));
        let watcher = Arc::new(UnitWatcher {
            session: session.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let dialogue = Arc::new(AcceptingDialogue::default());
        let services = Arc::new(RunnerServices {
            line_provider: watcher.clone(),
            commands: Arc::new(ActionRegistry::new()),
            unhandled_commands: None,
            config: RunnerConfig::default(),
            emitter: EventEmitter::default(),
        });
        let dispatcher = EventDispatcher::new(
            dialogue.clone(),
            services,
            session.clone(),
            vec![Some(watcher.clone() as Arc<dyn DialogueView>)],
        );

        let option_set = OptionSet {
            options: ["opt:yes", "opt:no"]
                .iter()
                .enumerate()
                .map(|(id, line_id)| OptionItem {
                    id,
                    line: Line::new(*line_id),
                    is_available: true,
                })
                .collect(),
        };
        let advance = dispatcher
            .dispatch(DialogueEvent::Options(option_set))
            .await
            .expect("options settle");

        assert_eq!(advance, Advance::Continue);
        assert_eq!(*dialogue.selected.lock().unwrap(), [1]);
        assert_eq!(
            *watcher.seen.lock().unwrap(),
            [
                ("localize", None),
                ("localize", None),
                ("run_options", Some(UnitKind::Options)),
            ]
        );
        assert_eq!(session.current_unit_kind(), None);
    }
}
