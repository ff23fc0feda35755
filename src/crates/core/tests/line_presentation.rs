mod common;

use common::*;
use parley_core::dialogue::{DialogueEvent, Line};
use parley_core::infrastructure::{DiagnosticKind, RunnerEvent};
use parley_core::runner::DialogueView;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn every_view_presents_every_line() {
    let dialogue = RecordingDialogue::new(vec![vec![line("line:1")], vec![line("line:3")]]);
    let first = TestView::lines("first", LineBehaviour::Immediate);
    let second = TestView::lines("second", LineBehaviour::Delay(Duration::from_millis(50)));
    let runner = runner_with_views(dialogue.clone(), &[first.clone(), second.clone()]);

    runner.start_dialogue("Start").expect("dialogue starts");
    runner.wait_for_completion().await.expect("dialogue completes cleanly");

    for view in [&first, &second] {
        assert_eq!(view.line_ids(), ["line:1", "line:3"]);
        assert_eq!(view.started.load(Ordering::SeqCst), 1);
        assert_eq!(view.completed(), 1);
    }
    assert_eq!(dialogue.count(&Call::Continue), 3);
    assert!(!runner.is_dialogue_running());
}

#[tokio::test(start_paused = true)]
async fn lines_are_localised_before_presentation() {
    let dialogue = RecordingDialogue::new(vec![vec![DialogueEvent::Line(
        Line::new("line:2").with_substitutions(vec!["Alice".to_string()]),
    )]]);
    let view = TestView::lines("view", LineBehaviour::Immediate);
    let runner = runner_with_views(dialogue, &[view.clone()]);

    runner.start_dialogue("Start").expect("dialogue starts");
    runner.wait_for_completion().await.expect("dialogue completes cleanly");

    let lines = view.lines.lock().unwrap();
    assert_eq!(lines[0].raw_text, "Bob: Hi, Alice.");
    assert_eq!(lines[0].character_name.as_deref(), Some("Bob"));
    assert_eq!(lines[0].text, "Hi, Alice.");
}

#[tokio::test(start_paused = true)]
async fn dialogue_advances_with_no_views() {
    let dialogue = RecordingDialogue::new(vec![vec![line("line:1")], vec![line("line:2")]]);
    let runner = runner_with_views(dialogue.clone(), &[]);

    runner.start_dialogue("Start").expect("dialogue starts");
    runner.wait_for_completion().await.expect("dialogue completes cleanly");

    assert_eq!(dialogue.count(&Call::Continue), 3);
}

#[tokio::test(start_paused = true)]
async fn missing_line_is_reported_and_skipped() {
    let dialogue = RecordingDialogue::new(vec![vec![line("line:unknown")], vec![line("line:1")]]);
    let view = TestView::lines("view", LineBehaviour::Immediate);
    let runner = runner_with_views(dialogue, &[view.clone()]);
    let mut events = runner.subscribe();

    runner.start_dialogue("Start").expect("dialogue starts");
    let seen = collect_until_completed(&mut events).await;

    assert_eq!(diagnostics(&seen, DiagnosticKind::MissingLine), 1);
    assert_eq!(view.line_ids(), ["line:1"]);
}

#[tokio::test(start_paused = true)]
async fn next_line_request_releases_the_line() {
    let dialogue = RecordingDialogue::new(vec![vec![line("line:1")]]);
    let view = TestView::lines("view", LineBehaviour::UntilNextLine);
    let runner = runner_with_views(dialogue, &[view.clone()]);

    runner.start_dialogue("Start").expect("dialogue starts");
    wait_notified(&view.line_started).await;
    assert!(runner.request_next_line());

    runner.wait_for_completion().await.expect("dialogue completes cleanly");
    assert_eq!(view.next_line_seen.load(Ordering::SeqCst), 1);
    assert_eq!(view.hurried.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn hurry_up_leaves_the_line_running() {
    let dialogue = RecordingDialogue::new(vec![vec![line("line:1")]]);
    let view = TestView::lines("view", LineBehaviour::UntilNextLine);
    let runner = runner_with_views(dialogue, &[view.clone()]);

    runner.start_dialogue("Start").expect("dialogue starts");
    wait_notified(&view.line_started).await;
    assert!(runner.request_hurry_up());

    eventually(|| view.hurried.load(Ordering::SeqCst) == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(runner.is_dialogue_running());
    assert_eq!(view.next_line_seen.load(Ordering::SeqCst), 0);

    assert!(runner.handle().request_next_line());
    runner.wait_for_completion().await.expect("dialogue completes cleanly");
    assert_eq!(view.next_line_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn line_requests_outside_a_line_are_ignored() {
    let dialogue = RecordingDialogue::new(vec![vec![options(&["opt:yes", "opt:no"])]]);
    let view = TestView::options("chooser", OptionBehaviour::WaitForCancel);
    let runner = runner_with_views(dialogue, &[view.clone()]);

    assert!(!runner.request_next_line());
    assert!(!runner.request_hurry_up());

    runner.start_dialogue("Start").expect("dialogue starts");
    wait_notified(&view.options_started).await;
    assert!(!runner.request_next_line());
    assert!(!runner.request_hurry_up());
    assert_eq!(view.options_cancelled.load(Ordering::SeqCst), 0);

    runner.stop();
    runner.wait_for_completion().await.expect("stopped dialogue completes");
}

#[tokio::test(start_paused = true)]
async fn failing_views_do_not_block_their_siblings() {
    let dialogue = RecordingDialogue::new(vec![vec![line("line:1")], vec![line("line:3")]]);
    let failing = TestView::lines("failing", LineBehaviour::Fail);
    let panicking = TestView::lines("panicking", LineBehaviour::Panic);
    let healthy = TestView::lines("healthy", LineBehaviour::Immediate);
    let runner = runner_with_views(
        dialogue,
        &[failing.clone(), panicking.clone(), healthy.clone()],
    );
    let mut events = runner.subscribe();

    runner.start_dialogue("Start").expect("dialogue starts");
    let seen = collect_until_completed(&mut events).await;

    assert_eq!(healthy.line_ids(), ["line:1", "line:3"]);
    assert_eq!(diagnostics(&seen, DiagnosticKind::ViewFault), 4);
    let faulted_views: Vec<_> = seen
        .iter()
        .filter_map(RunnerEvent::as_diagnostic)
        .filter_map(|d| d.view.clone())
        .collect();
    assert!(faulted_views.iter().any(|v| v == "panicking"));
    assert!(faulted_views.iter().any(|v| v == "failing"));
    assert_eq!(panicking.completed(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_view_slots_are_skipped() {
    let dialogue = RecordingDialogue::new(vec![vec![line("line:1")]]);
    let view = TestView::lines("view", LineBehaviour::Immediate);
    let runner = builder_with_views(dialogue, &[])
        .views(vec![None, Some(view.clone() as Arc<dyn DialogueView>), None])
        .build();

    runner.start_dialogue("Start").expect("dialogue starts");
    runner.wait_for_completion().await.expect("dialogue completes cleanly");

    assert_eq!(view.line_ids(), ["line:1"]);
}
