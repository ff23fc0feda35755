use super::dispatcher::{Advance, EventDispatcher, RunnerServices};
use super::session::Session;
use super::view::DialogueView;
use super::RunnerState;
use crate::commands::{ActionRegistry, CommandDispatcher, UnhandledCommandHandler};
use crate::config::RunnerConfig;
use crate::dialogue::{
    dialogue_event_channel, DialogueEvent, DialogueEventReceiver, DialogueProject,
    DialogueStateMachine,
};
use crate::infrastructure::events::{DiagnosticKind, EventEmitter, RunnerEvent};
use crate::line::{LineProvider, TableLineProvider};
use crate::util::errors::{ParleyError, ParleyResult};
use crate::util::lock;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

struct RunnerCore<P> {
    state: RunnerState,
    project: Option<DialogueProject<P>>,
    views: Vec<Option<Arc<dyn DialogueView>>>,
    session: Option<Arc<Session>>,
    driver: Option<JoinHandle<ParleyResult<()>>>,
}

struct RunnerInner<D: DialogueStateMachine> {
    dialogue: Arc<D>,
    /// Held by the driver task for the lifetime of a session.
    events: tokio::sync::Mutex<DialogueEventReceiver>,
    core: Mutex<RunnerCore<D::Program>>,
    services: Arc<RunnerServices>,
}

/// Runs dialogue from a state machine, presenting its content through the registered
/// views.
///
/// One dialogue runs at a time. `start_dialogue` returns immediately; the session is
/// driven by a background task until the state machine reports completion. Dropping the
/// runner stops any running dialogue.
pub struct DialogueRunner<D: DialogueStateMachine> {
    inner: Arc<RunnerInner<D>>,
}

/// Cloneable control surface for a running dialogue, for use from views or input tasks.
pub struct RunnerHandle<D: DialogueStateMachine> {
    inner: Arc<RunnerInner<D>>,
}

impl<D: DialogueStateMachine> Clone for RunnerHandle<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

pub struct DialogueRunnerBuilder<D: DialogueStateMachine> {
    dialogue: Arc<D>,
    project: Option<DialogueProject<D::Program>>,
    views: Vec<Option<Arc<dyn DialogueView>>>,
    line_provider: Option<Arc<dyn LineProvider>>,
    commands: Option<Arc<dyn CommandDispatcher>>,
    unhandled_commands: Option<Arc<dyn UnhandledCommandHandler>>,
    config: RunnerConfig,
}

impl<D: DialogueStateMachine> DialogueRunnerBuilder<D> {
    pub fn new(dialogue: Arc<D>) -> Self {
        Self {
            dialogue,
            project: None,
            views: Vec::new(),
            line_provider: None,
            commands: None,
            unhandled_commands: None,
            config: RunnerConfig::default(),
        }
    }

    pub fn project(mut self, project: DialogueProject<D::Program>) -> Self {
        self.project = Some(project);
        self
    }

    pub fn view(mut self, view: Arc<dyn DialogueView>) -> Self {
        self.views.push(Some(view));
        self
    }

    /// Replaces the view list. Empty slots are skipped when events are dispatched.
    pub fn views(mut self, views: Vec<Option<Arc<dyn DialogueView>>>) -> Self {
        self.views = views;
        self
    }

    pub fn line_provider(mut self, provider: Arc<dyn LineProvider>) -> Self {
        self.line_provider = Some(provider);
        self
    }

    pub fn command_dispatcher(mut self, commands: Arc<dyn CommandDispatcher>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn unhandled_command_handler(mut self, handler: Arc<dyn UnhandledCommandHandler>) -> Self {
        self.unhandled_commands = Some(handler);
        self
    }

    pub fn config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> DialogueRunner<D> {
        let (sink, events) = dialogue_event_channel();
        self.dialogue.attach_event_sink(sink);

        let line_provider = self
            .line_provider
            .unwrap_or_else(|| Arc::new(TableLineProvider::new()));
        let commands = self
            .commands
            .unwrap_or_else(|| Arc::new(ActionRegistry::with_builtins()));
        let emitter = EventEmitter::new(self.config.event_capacity);

        DialogueRunner {
            inner: Arc::new(RunnerInner {
                dialogue: self.dialogue,
                events: tokio::sync::Mutex::new(events),
                core: Mutex::new(RunnerCore {
                    state: RunnerState::Idle,
                    project: self.project,
                    views: self.views,
                    session: None,
                    driver: None,
                }),
                services: Arc::new(RunnerServices {
                    line_provider,
                    commands,
                    unhandled_commands: self.unhandled_commands,
                    config: self.config,
                    emitter,
                }),
            }),
        }
    }
}

impl<D: DialogueStateMachine> DialogueRunner<D> {
    pub fn builder(dialogue: Arc<D>) -> DialogueRunnerBuilder<D> {
        DialogueRunnerBuilder::new(dialogue)
    }

    /// Creates a runner with the default line provider and command registry.
    pub fn new(dialogue: Arc<D>) -> Self {
        DialogueRunnerBuilder::new(dialogue).build()
    }

    /// Starts dialogue at `node_name`.
    ///
    /// Must be called from within a Tokio runtime. Fails when dialogue is already
    /// running, when no project or no compiled program is configured, or when the state
    /// machine rejects the program or node.
    pub fn start_dialogue(&self, node_name: &str) -> ParleyResult<()> {
        self.inner.start_dialogue(node_name)
    }

    /// Starts dialogue at the configured start node.
    pub fn start_default(&self) -> ParleyResult<()> {
        let node = self.inner.services.config.start_node.clone();
        self.inner.start_dialogue(&node)
    }

    /// Stops the running dialogue. Views observe cancellation of the current unit and
    /// of the dialogue, then receive `on_dialogue_complete` once the state machine reports
    /// completion. No-op when idle.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn request_next_line(&self) -> bool {
        self.inner.request_next_line()
    }

    pub fn request_hurry_up(&self) -> bool {
        self.inner.request_hurry_up()
    }

    pub fn set_project(&self, project: DialogueProject<D::Program>) -> ParleyResult<()> {
        let mut core = lock(&self.inner.core);
        if core.state.is_running() {
            return Err(ParleyError::invalid_state(
                "Can't set project, because dialogue is currently running",
            ));
        }
        info!("Dialogue project set: name={}", project.name);
        core.project = Some(project);
        Ok(())
    }

    pub fn project_name(&self) -> Option<String> {
        lock(&self.inner.core)
            .project
            .as_ref()
            .map(|project| project.name.clone())
    }

    /// Replaces the view list. Takes effect from the next `start_dialogue`.
    pub fn set_views(&self, views: Vec<Option<Arc<dyn DialogueView>>>) {
        lock(&self.inner.core).views = views;
    }

    /// Appends a view. Takes effect from the next `start_dialogue`.
    pub fn add_view(&self, view: Arc<dyn DialogueView>) {
        lock(&self.inner.core).views.push(Some(view));
    }

    pub fn state(&self) -> RunnerState {
        self.inner.state()
    }

    pub fn is_dialogue_running(&self) -> bool {
        self.inner.state().is_running()
    }

    pub fn current_session_id(&self) -> Option<String> {
        lock(&self.inner.core)
            .session
            .as_ref()
            .map(|session| session.id().to_string())
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.inner.services.config
    }

    pub fn dialogue(&self) -> &Arc<D> {
        &self.inner.dialogue
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunnerEvent> {
        self.inner.services.emitter.subscribe()
    }

    pub fn handle(&self) -> RunnerHandle<D> {
        RunnerHandle {
            inner: self.inner.clone(),
        }
    }

    /// Waits for the current session to finish. Returns the fault that ended it, if the
    /// session was torn down by a fatal error. Returns immediately when idle.
    pub async fn wait_for_completion(&self) -> ParleyResult<()> {
        let driver = lock(&self.inner.core).driver.take();
        match driver {
            Some(driver) => driver
                .await
                .map_err(|e| ParleyError::Internal(format!("Dialogue driver task failed: {}", e)))?,
            None => Ok(()),
        }
    }
}

impl<D: DialogueStateMachine> Drop for DialogueRunner<D> {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl<D: DialogueStateMachine> RunnerHandle<D> {
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn request_next_line(&self) -> bool {
        self.inner.request_next_line()
    }

    pub fn request_hurry_up(&self) -> bool {
        self.inner.request_hurry_up()
    }

    pub fn state(&self) -> RunnerState {
        self.inner.state()
    }

    pub fn is_dialogue_running(&self) -> bool {
        self.inner.state().is_running()
    }
}

impl<D: DialogueStateMachine> RunnerInner<D> {
    fn start_dialogue(self: &Arc<Self>, node_name: &str) -> ParleyResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ParleyError::invalid_state("Can't start dialogue outside of a Tokio runtime")
        })?;

        let mut core = lock(&self.core);
        if core.state.is_running() || self.dialogue.is_active() {
            error!("Can't start dialogue: dialogue is already running");
            return Err(ParleyError::invalid_state(
                "Can't start dialogue: dialogue is already running",
            ));
        }

        let program = match core.project.as_ref() {
            None => {
                error!("Can't start dialogue: no project has been set");
                return Err(ParleyError::validation(
                    "Can't start dialogue: no project has been set",
                ));
            }
            Some(project) => match project.program.clone() {
                Some(program) => program,
                None => {
                    error!(
                        "Can't start dialogue: project has no valid program: project={}",
                        project.name
                    );
                    return Err(ParleyError::validation(format!(
                        "Can't start dialogue: project '{}' doesn't contain a valid program",
                        project.name
                    )));
                }
            },
        };

        self.discard_stale_events()?;
        self.dialogue.set_program(program)?;
        self.dialogue.set_node(node_name)?;

        let session = Arc::new(Session::new(node_name));
        core.state = RunnerState::Running;
        core.session = Some(session.clone());

        let dispatcher = EventDispatcher::new(
            self.dialogue.clone(),
            self.services.clone(),
            session.clone(),
            core.views.clone(),
        );

        info!(
            "Dialogue started: session_id={}, node={}, views={}",
            session.id(),
            node_name,
            core.views.iter().flatten().count()
        );
        self.services.emitter.emit(RunnerEvent::DialogueStarted {
            session_id: session.id().to_string(),
            node: node_name.to_string(),
            timestamp: session.started_at_ms(),
        });

        core.driver = Some(runtime.spawn(drive(self.clone(), dispatcher, session)));
        Ok(())
    }

    /// Drops events a previous session left in the channel, such as the completion raised
    /// by a stop that happened after the machine had already been torn down.
    fn discard_stale_events(&self) -> ParleyResult<()> {
        let mut events = self.events.try_lock().map_err(|_| {
            ParleyError::invalid_state(
                "Can't start dialogue: previous dialogue is still shutting down",
            )
        })?;
        while let Ok(event) = events.try_recv() {
            debug!("Discarding stale dialogue event: event={}", event.kind());
        }
        Ok(())
    }

    fn stop(&self) {
        let session = {
            let mut core = lock(&self.core);
            if core.state != RunnerState::Running {
                return;
            }
            core.state = RunnerState::Cancelling;
            core.session.clone()
        };

        if let Some(session) = session {
            debug!("Stopping dialogue: session_id={}", session.id());
            session.cancel();
        }
        self.dialogue.stop();
    }

    fn request_next_line(&self) -> bool {
        self.current_session()
            .is_some_and(|session| session.request_next_line())
    }

    fn request_hurry_up(&self) -> bool {
        self.current_session()
            .is_some_and(|session| session.request_hurry_up())
    }

    fn state(&self) -> RunnerState {
        lock(&self.core).state
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        lock(&self.core).session.clone()
    }

    fn mark_cancelling(&self, session: &Arc<Session>) {
        let mut core = lock(&self.core);
        let is_current = core
            .session
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session));
        if is_current && core.state == RunnerState::Running {
            core.state = RunnerState::Cancelling;
        }
    }

    fn finish_session(&self, session: &Arc<Session>) {
        session.cancel();
        {
            let mut core = lock(&self.core);
            let is_current = core
                .session
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, session));
            if is_current {
                core.session = None;
                core.state = RunnerState::Idle;
            }
        }

        info!("Dialogue completed: session_id={}", session.id());
        self.services.emitter.emit(RunnerEvent::DialogueCompleted {
            session_id: session.id().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
    }
}

async fn drive<D: DialogueStateMachine>(
    inner: Arc<RunnerInner<D>>,
    dispatcher: EventDispatcher<D>,
    session: Arc<Session>,
) -> ParleyResult<()> {
    let _finish = FinishOnDrop {
        inner: &inner,
        session: session.clone(),
    };
    let mut events = inner.events.lock().await;
    let outcome = SessionDriver {
        inner: &inner,
        dispatcher,
        session,
        fault: None,
    }
    .run(&mut events)
    .await;
    outcome
}

/// Returns the runner to idle when the driver ends, including by panic.
struct FinishOnDrop<'a, D: DialogueStateMachine> {
    inner: &'a RunnerInner<D>,
    session: Arc<Session>,
}

impl<D: DialogueStateMachine> Drop for FinishOnDrop<'_, D> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(
                "Dialogue driver panicked, stopping dialogue: session_id={}",
                self.session.id()
            );
            self.inner.dialogue.stop();
        }
        self.inner.finish_session(&self.session);
    }
}

/// Pulls events for one session and feeds their outcome back into the state machine.
struct SessionDriver<'a, D: DialogueStateMachine> {
    inner: &'a RunnerInner<D>,
    dispatcher: EventDispatcher<D>,
    session: Arc<Session>,
    fault: Option<ParleyError>,
}

impl<D: DialogueStateMachine> SessionDriver<'_, D> {
    async fn run(mut self, events: &mut DialogueEventReceiver) -> ParleyResult<()> {
        let started = self.dispatcher.handle_dialogue_started().await;
        let mut finished = self.settle(Ok(started)).await;

        while !finished {
            let Some(event) = events.recv().await else {
                warn!(
                    "Dialogue event channel closed before completion: session_id={}",
                    self.session.id()
                );
                self.dispatcher.handle_dialogue_complete().await;
                break;
            };

            if matches!(event, DialogueEvent::DialogueCompleted) {
                self.dispatcher.handle_dialogue_complete().await;
                break;
            }
            if self.session.is_cancelled() && event.presents_content() {
                debug!(
                    "Skipping dialogue event after cancellation: session_id={}, event={}",
                    self.session.id(),
                    event.kind()
                );
                continue;
            }

            let settled = self.dispatcher.dispatch(event).await;
            finished = self.settle(settled).await;
        }

        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Applies the outcome of an event. Returns true when the session ended without a
    /// completion event to wait for.
    async fn settle(&mut self, settled: ParleyResult<Advance>) -> bool {
        let result = match settled {
            Ok(Advance::Continue) => self.inner.dialogue.continue_dialogue().map_err(|e| {
                if e.is_fatal() {
                    e
                } else {
                    ParleyError::state_machine(format!("Failed to continue dialogue: {}", e))
                }
            }),
            Ok(Advance::Hold) => Ok(()),
            Err(e) => Err(e),
        };
        let Err(error) = result else {
            return false;
        };
        if self.session.is_cancelled() && !matches!(error, ParleyError::ConsistencyViolation(_)) {
            // A stop raced the advance; its completion event ends the session.
            debug!(
                "Ignoring state machine refusal after stop: session_id={}, error={}",
                self.session.id(),
                error
            );
            return false;
        }

        let was_active = self.inner.dialogue.is_active();
        self.escalate(error);
        if was_active {
            self.inner.dialogue.stop();
            return false;
        }

        // Nothing will raise completion for a machine that is already inactive.
        self.dispatcher.handle_dialogue_complete().await;
        true
    }

    fn escalate(&mut self, error: ParleyError) {
        let kind = match error {
            ParleyError::ConsistencyViolation(_) => DiagnosticKind::ConsistencyViolation,
            _ => DiagnosticKind::StateMachineFault,
        };
        self.inner.services.emitter.report(
            kind,
            Some(self.session.id()),
            None,
            format!("Stopping dialogue: {}", error),
        );

        self.inner.mark_cancelling(&self.session);
        self.session.cancel();
        if self.fault.is_none() {
            self.fault = Some(error);
        }
    }
}
