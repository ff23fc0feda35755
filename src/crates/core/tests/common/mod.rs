#![allow(dead_code)]

use async_trait::async_trait;
use parley_core::dialogue::{
    DialogueEvent, DialogueEventSender, DialogueProject, DialogueStateMachine, Line, OptionId,
    OptionItem, OptionSet,
};
use parley_core::infrastructure::{DiagnosticKind, RunnerEvent};
use parley_core::line::{DialogueOption, LocalizedLine, TableLineProvider};
use parley_core::runner::{
    DialogueRunner, DialogueRunnerBuilder, DialogueView, LineCancellationToken,
};
use parley_core::{ParleyError, ParleyResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

pub const WAIT_LIMIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetNode(String),
    Continue,
    Selected(OptionId),
    Stop,
}

/// State machine that replays a fixed list of event batches, one batch per continue, and
/// completes once the list runs out.
pub struct RecordingDialogue {
    sink: Mutex<Option<DialogueEventSender>>,
    active: AtomicBool,
    batches: Mutex<VecDeque<Vec<DialogueEvent>>>,
    calls: Mutex<Vec<Call>>,
    before_continue: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl RecordingDialogue {
    pub fn new(batches: Vec<Vec<DialogueEvent>>) -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(None),
            active: AtomicBool::new(false),
            batches: Mutex::new(batches.into()),
            calls: Mutex::new(Vec::new()),
            before_continue: Mutex::new(None),
        })
    }

    /// Runs `hook` at the start of the next continue, before the machine checks its state.
    pub fn before_next_continue(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_continue.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn load(&self, batches: Vec<Vec<DialogueEvent>>) {
        *self.batches.lock().unwrap() = batches.into();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn selections(&self) -> Vec<OptionId> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                Call::Selected(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn emit(&self, event: DialogueEvent) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            let _ = sink.send(event);
        }
    }
}

impl DialogueStateMachine for RecordingDialogue {
    type Program = ();

    fn attach_event_sink(&self, sink: DialogueEventSender) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn set_program(&self, _program: Arc<()>) -> ParleyResult<()> {
        Ok(())
    }

    fn set_node(&self, node_name: &str) -> ParleyResult<()> {
        self.record(Call::SetNode(node_name.to_string()));
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn continue_dialogue(&self) -> ParleyResult<()> {
        let hook = self.before_continue.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.record(Call::Continue);
        if !self.active.load(Ordering::SeqCst) {
            return Err(ParleyError::invalid_state("not running"));
        }
        let batch = self.batches.lock().unwrap().pop_front();
        match batch {
            Some(events) => events.into_iter().for_each(|event| self.emit(event)),
            None => {
                self.active.store(false, Ordering::SeqCst);
                self.emit(DialogueEvent::DialogueCompleted);
            }
        }
        Ok(())
    }

    fn set_selected_option(&self, option_id: OptionId) -> ParleyResult<()> {
        self.record(Call::Selected(option_id));
        Ok(())
    }

    fn stop(&self) {
        self.record(Call::Stop);
        if self.active.swap(false, Ordering::SeqCst) {
            self.emit(DialogueEvent::DialogueCompleted);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub enum LineBehaviour {
    Immediate,
    /// Presents until the delay elapses or the next line is requested.
    Delay(Duration),
    /// Presents until the next line is requested, noting any hurry-up on the way.
    UntilNextLine,
    Fail,
    Panic,
}

#[derive(Debug, Clone)]
pub enum OptionBehaviour {
    Select { id: OptionId, after: Duration },
    Decline,
    WaitForCancel,
    Fail,
}

pub struct TestView {
    name: String,
    line_behaviour: LineBehaviour,
    option_behaviour: OptionBehaviour,
    pub lines: Mutex<Vec<LocalizedLine>>,
    pub offered: Mutex<Vec<Vec<DialogueOption>>>,
    pub started: AtomicUsize,
    pub completed: AtomicUsize,
    pub hurried: AtomicUsize,
    pub next_line_seen: AtomicUsize,
    pub options_cancelled: AtomicUsize,
    pub line_started: Notify,
    pub options_started: Notify,
}

impl TestView {
    pub fn new(name: &str, line: LineBehaviour, options: OptionBehaviour) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            line_behaviour: line,
            option_behaviour: options,
            lines: Mutex::new(Vec::new()),
            offered: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            hurried: AtomicUsize::new(0),
            next_line_seen: AtomicUsize::new(0),
            options_cancelled: AtomicUsize::new(0),
            line_started: Notify::new(),
            options_started: Notify::new(),
        })
    }

    pub fn lines(name: &str, behaviour: LineBehaviour) -> Arc<Self> {
        Self::new(name, behaviour, OptionBehaviour::Decline)
    }

    pub fn options(name: &str, behaviour: OptionBehaviour) -> Arc<Self> {
        Self::new(name, LineBehaviour::Immediate, behaviour)
    }

    pub fn line_ids(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|line| line.line_id.clone())
            .collect()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DialogueView for TestView {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_dialogue_started(&self) -> ParleyResult<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run_line(
        &self,
        line: &LocalizedLine,
        token: &LineCancellationToken,
    ) -> ParleyResult<()> {
        self.lines.lock().unwrap().push(line.clone());
        self.line_started.notify_one();

        match self.line_behaviour {
            LineBehaviour::Immediate => Ok(()),
            LineBehaviour::Delay(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.next_line.cancelled() => {
                        self.next_line_seen.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Ok(())
            }
            LineBehaviour::UntilNextLine => {
                token.hurry_up.cancelled().await;
                if !token.is_next_line_requested() {
                    self.hurried.fetch_add(1, Ordering::SeqCst);
                    token.next_line.cancelled().await;
                }
                self.next_line_seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            LineBehaviour::Fail => Err(ParleyError::view("line rendering failed")),
            LineBehaviour::Panic => panic!("line view exploded"),
        }
    }

    async fn run_options(
        &self,
        options: &[DialogueOption],
        cancellation: &CancellationToken,
    ) -> ParleyResult<Option<OptionId>> {
        self.offered.lock().unwrap().push(options.to_vec());
        self.options_started.notify_one();

        match self.option_behaviour {
            OptionBehaviour::Select { id, after } => {
                tokio::select! {
                    _ = tokio::time::sleep(after) => Ok(Some(id)),
                    _ = cancellation.cancelled() => {
                        self.options_cancelled.fetch_add(1, Ordering::SeqCst);
                        Ok(None)
                    }
                }
            }
            OptionBehaviour::Decline => Ok(None),
            OptionBehaviour::WaitForCancel => {
                cancellation.cancelled().await;
                self.options_cancelled.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
            OptionBehaviour::Fail => Err(ParleyError::view("option rendering failed")),
        }
    }

    async fn on_dialogue_complete(&self) -> ParleyResult<()> {
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn line(id: &str) -> DialogueEvent {
    DialogueEvent::Line(Line::new(id))
}

pub fn options(ids: &[&str]) -> DialogueEvent {
    DialogueEvent::Options(OptionSet {
        options: ids
            .iter()
            .enumerate()
            .map(|(id, line_id)| OptionItem {
                id,
                line: Line::new(*line_id),
                is_available: true,
            })
            .collect(),
    })
}

pub fn command(text: &str) -> DialogueEvent {
    DialogueEvent::Command(parley_core::dialogue::Command::new(text))
}

pub fn string_table() -> Arc<TableLineProvider> {
    Arc::new(TableLineProvider::from_strings([
        ("line:1", "Alice: Hello."),
        ("line:2", "Bob: Hi, {0}."),
        ("line:3", "The wind picks up."),
        ("opt:yes", "Yes"),
        ("opt:no", "No"),
        ("opt:maybe", "Maybe"),
    ]))
}

/// Builder with a project, the shared string table and the given views registered.
pub fn builder_with_views(
    dialogue: Arc<RecordingDialogue>,
    views: &[Arc<TestView>],
) -> DialogueRunnerBuilder<RecordingDialogue> {
    views.iter().fold(
        DialogueRunner::builder(dialogue)
            .project(DialogueProject::new("test-project", ()))
            .line_provider(string_table()),
        |builder, view| builder.view(view.clone()),
    )
}

pub fn runner_with_views(
    dialogue: Arc<RecordingDialogue>,
    views: &[Arc<TestView>],
) -> DialogueRunner<RecordingDialogue> {
    builder_with_views(dialogue, views).build()
}

/// Receives runner events until the dialogue-completed event, inclusive.
pub async fn collect_until_completed(
    events: &mut broadcast::Receiver<RunnerEvent>,
) -> Vec<RunnerEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(WAIT_LIMIT, events.recv())
            .await
            .expect("dialogue completes in time")
            .expect("event stream stays open");
        let done = matches!(event, RunnerEvent::DialogueCompleted { .. });
        seen.push(event);
        if done {
            return seen;
        }
    }
}

pub async fn wait_for_diagnostic(
    events: &mut broadcast::Receiver<RunnerEvent>,
    kind: DiagnosticKind,
) -> RunnerEvent {
    loop {
        let event = tokio::time::timeout(WAIT_LIMIT, events.recv())
            .await
            .expect("diagnostic arrives in time")
            .expect("event stream stays open");
        if event.as_diagnostic().is_some_and(|d| d.kind == kind) {
            return event;
        }
    }
}

pub fn diagnostics(events: &[RunnerEvent], kind: DiagnosticKind) -> usize {
    events
        .iter()
        .filter_map(RunnerEvent::as_diagnostic)
        .filter(|d| d.kind == kind)
        .count()
}

pub async fn wait_notified(notify: &Notify) {
    tokio::time::timeout(WAIT_LIMIT, notify.notified())
        .await
        .expect("notification arrives in time");
}

/// Polls `check` until it holds, letting other tasks and virtual time make progress.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT_LIMIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition holds in time");
}
