//! End-to-end engine behavior over scripted event streams.

mod common;

use std::time::Duration;

use common::{ev, harness, harness_bulk, Tail};
use pretty_assertions::assert_eq;
use serde_json::json;
use tether::engine::{RunOutcome, RunState, SubmitOutcome};
use tether::serializer::serialize;
use tether::store::MessageStore;
use tether::types::{MessageRole, RecordKind};

#[tokio::test]
async fn completed_run_finalizes_the_assistant_message() {
    let (controller, store, _) = harness(
        vec![
            ev("run_started", json!({"trace_id": "T1"})),
            ev("assistant", json!({"text": "Hi"})),
            ev("assistant", json!({"text": " there"})),
            ev("complete", json!({"answer": "Hi there", "turns": 1})),
        ],
        Tail::End,
    );

    let outcome = controller.submit("hello").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Completed));

    let messages = store.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "hello");

    let assistant = &messages[1];
    assert!(assistant.content.contains("Hi there"));
    assert_eq!(assistant.trace_id.as_deref(), Some("T1"));
    assert!(!assistant.is_loading);
    assert!(!assistant.has_error());

    // run_started + one merged assistant record + complete
    let records = assistant.records.as_ref().unwrap();
    assert_eq!(records.len(), 3);

    assert!(!store.is_running());
    assert_eq!(controller.state().await, RunState::Idle);
}

#[tokio::test]
async fn tool_activity_is_logged_and_serialized() {
    let (controller, store, _) = harness(
        vec![
            ev("run_started", json!({"trace_id": "T2"})),
            ev("tool_call", json!({"name": "search", "input": {"q": "x"}})),
            ev("tool_result", json!({"name": "search", "result": "ok"})),
            ev("complete", json!({"answer": "done"})),
        ],
        Tail::End,
    );

    let outcome = controller.submit("run tool").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Completed));

    let messages = store.messages();
    let assistant = &messages[1];
    let records = assistant.records.as_ref().unwrap();

    let tool_calls = records
        .iter()
        .filter(|r| r.kind() == RecordKind::ToolCall)
        .count();
    let tool_results = records
        .iter()
        .filter(|r| r.kind() == RecordKind::ToolResult)
        .count();
    assert_eq!(tool_calls, 1);
    assert_eq!(tool_results, 1);
    assert!(records.has_complete());

    assert_eq!(assistant.content.matches("search").count(), 2);
}

#[tokio::test]
async fn tool_call_splits_assistant_paragraphs() {
    let (controller, store, _) = harness(
        vec![
            ev("assistant", json!({"text": "One"})),
            ev("tool_call", json!({"name": "probe"})),
            ev("assistant", json!({"text": "Two"})),
            ev("complete", json!({})),
        ],
        Tail::End,
    );

    controller.submit("go").await.unwrap();

    let assistant = &store.messages()[1];
    assert_eq!(assistant.content, "One\n\ntool: probe\n\nTwo");
    let records = assistant.records.as_ref().unwrap();
    assert_eq!(records.len(), 4);
}

#[tokio::test]
async fn transport_failure_preserves_partial_progress() {
    let (controller, store, _) = harness(
        vec![
            ev("run_started", json!({"trace_id": "T3"})),
            ev("assistant", json!({"text": "partial answer"})),
        ],
        Tail::Fail,
    );

    let outcome = controller.submit("hello").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Failed));

    let assistant = &store.messages()[1];
    assert!(!assistant.is_loading);
    assert!(assistant
        .error
        .as_deref()
        .unwrap()
        .contains("connection reset"));

    let records = assistant.records.as_ref().unwrap();
    assert_eq!(records.last().unwrap().kind(), RecordKind::Error);
    assert!(assistant.content.contains("partial answer"));
    assert!(assistant.content.contains("[error] connection lost"));

    assert!(!store.is_running());
}

#[tokio::test]
async fn transport_failure_with_no_progress_writes_generic_error() {
    let (controller, store, _) = harness(Vec::new(), Tail::Fail);

    let outcome = controller.submit("hello").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Failed));

    let assistant = &store.messages()[1];
    assert!(!assistant.is_loading);
    assert!(assistant.has_error());
    assert!(assistant.records.is_none());
    assert!(assistant.content.is_empty());
}

#[tokio::test]
async fn cancel_before_any_record_retracts_the_submission() {
    let (controller, store, _) = harness(Vec::new(), Tail::Hang);

    let handle = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit("doomed").await }
    });

    while controller.state().await != RunState::Streaming {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(store.message_count(), 2);
    assert!(controller.cancel().await);

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Retracted));

    // Both the user message and the placeholder are gone.
    assert_eq!(store.message_count(), 0);
    assert!(!store.is_running());
    assert_eq!(controller.state().await, RunState::Idle);
}

#[tokio::test]
async fn cancel_after_progress_keeps_the_partial_transcript() {
    let (controller, store, _) = harness(
        vec![
            ev("run_started", json!({"trace_id": "T4"})),
            ev("assistant", json!({"text": "Working on it"})),
        ],
        Tail::Hang,
    );

    let mut snapshots = controller.watch_snapshot();
    let handle = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit("long task").await }
    });

    loop {
        if snapshots.borrow().records.len() >= 2 {
            break;
        }
        snapshots.changed().await.unwrap();
    }
    assert!(controller.cancel().await);

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::CancelledWithProgress));

    let assistant = &store.messages()[1];
    assert!(!assistant.is_loading);
    assert!(!assistant.has_error());
    assert!(assistant.content.contains("Working on it"));
    assert_eq!(assistant.records.as_ref().unwrap().len(), 2);
}

#[tokio::test]
async fn second_submit_with_known_trace_routes_to_steering() {
    let (controller, store, steer) = harness(
        vec![ev("run_started", json!({"trace_id": "T9"}))],
        Tail::Hang,
    );

    let handle = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit("first").await }
    });

    while controller.trace_id().await.as_deref() != Some("T9") {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(store.message_count(), 2);

    let outcome = controller.submit("more guidance").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Steered);
    assert_eq!(steer.sent(), vec![("T9".to_owned(), "more guidance".to_owned())]);

    // No new messages and no new records from the steering path.
    assert_eq!(store.message_count(), 2);

    controller.cancel().await;
    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::CancelledWithProgress));
}

#[tokio::test]
async fn second_submit_without_trace_is_rejected_outright() {
    let (controller, store, steer) = harness(Vec::new(), Tail::Hang);

    let handle = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit("first").await }
    });

    while controller.state().await != RunState::Streaming {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let outcome = controller.submit("second").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ignored);
    assert!(steer.sent().is_empty());
    assert_eq!(store.message_count(), 2);

    controller.cancel().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn steer_sends_once_trace_is_known() {
    let (controller, _, steer) = harness(
        vec![ev("run_started", json!({"trace_id": "T6"}))],
        Tail::Hang,
    );

    let handle = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit("task").await }
    });

    while controller.trace_id().await.is_none() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(controller.steer("adjust course").await.unwrap());
    assert_eq!(steer.sent(), vec![("T6".to_owned(), "adjust course".to_owned())]);

    controller.cancel().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn explicit_error_takes_precedence_over_failed_complete() {
    let (controller, store, _) = harness(
        vec![
            ev("run_started", json!({"trace_id": "T7"})),
            ev("assistant", json!({"text": "trying"})),
            ev("error", json!({"message": "tool exploded"})),
            ev("complete", json!({"success": false, "answer": "nope"})),
        ],
        Tail::End,
    );

    let outcome = controller.submit("risky").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Failed));

    let assistant = &store.messages()[1];
    assert_eq!(assistant.error.as_deref(), Some("tool exploded"));
    assert!(assistant.content.contains("[error] tool exploded"));

    // The failed completion is still part of history.
    let records = assistant.records.as_ref().unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.has_complete());
}

#[tokio::test]
async fn failed_complete_alone_finalizes_as_error() {
    let (controller, store, _) = harness(
        vec![ev("complete", json!({"success": false}))],
        Tail::End,
    );

    let outcome = controller.submit("hello").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Failed));

    let assistant = &store.messages()[1];
    assert_eq!(assistant.error.as_deref(), Some("run reported failure"));
    assert!(!assistant.is_loading);
}

#[tokio::test]
async fn fresh_session_id_reaches_the_store() {
    let (controller, store, _) = harness(
        vec![
            ev(
                "run_started",
                json!({"trace_id": "T5", "session_id": "S7"}),
            ),
            ev("complete", json!({})),
        ],
        Tail::End,
    );

    controller.submit("hello").await.unwrap();
    assert_eq!(store.session_id().as_deref(), Some("S7"));
}

#[tokio::test]
async fn output_files_flow_into_the_final_message() {
    let (controller, store, _) = harness(
        vec![
            ev("assistant", json!({"text": "Writing the report."})),
            ev(
                "output_file",
                json!({"file_id": "f1", "filename": "report.csv", "download_url": "/files/f1"}),
            ),
            // Malformed: no download reference; must be dropped, not recorded.
            ev("output_file", json!({"file_id": "f2", "filename": "bad.bin"})),
            ev("complete", json!({})),
        ],
        Tail::End,
    );

    controller.submit("make a report").await.unwrap();

    let assistant = &store.messages()[1];
    assert_eq!(assistant.output_files.len(), 1);
    assert_eq!(assistant.output_files[0].name, "report.csv");
    assert!(assistant.content.contains("file: report.csv"));
}

#[tokio::test]
async fn stream_end_without_complete_still_finalizes() {
    let (controller, store, _) = harness(
        vec![ev("assistant", json!({"text": "Hello."}))],
        Tail::End,
    );

    let outcome = controller.submit("hi").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Completed));

    let assistant = &store.messages()[1];
    assert_eq!(assistant.content, "Hello.");
    assert!(!assistant.is_loading);
    assert!(!assistant.has_error());
}

#[tokio::test]
async fn staged_attachments_are_consumed_by_submit() {
    let (controller, store, _) = harness(vec![ev("complete", json!({}))], Tail::End);

    controller
        .stage_attachment("data.csv", b"a,b\n".to_vec(), Some("text/csv"))
        .await
        .unwrap();
    assert_eq!(store.attachments().len(), 1);

    controller.submit("use the file").await.unwrap();
    assert!(store.attachments().is_empty());
    assert_eq!(store.message_count(), 2);
}

#[tokio::test]
async fn bulk_path_produces_the_same_transcript_as_streaming() {
    let events = vec![
        ev("run_started", json!({"trace_id": "T10"})),
        ev("assistant", json!({"text": "Summary: "})),
        ev("assistant", json!({"text": "all good"})),
        ev("tool_call", json!({"name": "search", "input": {"q": "x"}})),
        ev("tool_result", json!({"name": "search", "result": "ok"})),
        ev("complete", json!({"answer": "all good"})),
    ];

    let (streaming, stream_store, _) = harness(events.clone(), Tail::End);
    let outcome = streaming.submit("compare").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Completed));

    let (bulk, bulk_store, _) = harness_bulk(events, None);
    let outcome = bulk.submit("compare").await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ran(RunOutcome::Completed));

    let streamed = &stream_store.messages()[1];
    let bulked = &bulk_store.messages()[1];
    assert_eq!(streamed.content, bulked.content);
    assert_eq!(streamed.trace_id, bulked.trace_id);
    assert_eq!(streamed.error, bulked.error);
}

#[tokio::test]
async fn observed_snapshots_always_match_their_log() {
    let (controller, _, _) = harness(
        vec![
            ev("run_started", json!({"trace_id": "T8"})),
            ev("turn_started", json!({"turn": 1})),
            ev("assistant", json!({"text": "Thinking"})),
            ev("tool_call", json!({"name": "search", "input": {"q": "x"}})),
            ev("tool_result", json!({"name": "search", "result": "ok"})),
            ev("assistant", json!({"text": "Done"})),
            ev("complete", json!({"answer": "Done"})),
        ],
        Tail::End,
    );

    let mut snapshots = controller.watch_snapshot();
    let handle = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit("task").await }
    });

    while !handle.is_finished() {
        if tokio::time::timeout(Duration::from_millis(5), snapshots.changed())
            .await
            .is_ok()
        {
            let snapshot = snapshots.borrow().clone();
            assert_eq!(snapshot.text, serialize(snapshot.records.records()));
        }
    }
    handle.await.unwrap().unwrap();
}
