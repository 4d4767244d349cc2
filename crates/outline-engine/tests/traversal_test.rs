mod common;

use std::sync::Arc;

use common::*;
use outline_core::ordering::is_ordered;
use outline_core::{Checkpoint, ConversationContext, ConversationRecord, Message, NodeCoordinate};
use outline_engine::{EngineError, TraversalEvent, TraversalOrchestrator, TraversalOutcome};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn leaf_count(ctx: &ConversationContext) -> usize {
    ctx.messages.iter().filter(|m| m.is_leaf()).count()
}

fn drain(rx: &mut mpsc::Receiver<TraversalEvent>) -> Vec<TraversalEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_existing_node_is_skipped_and_others_generated() {
    let dialect = dialect();
    let mut ctx = context_with(two_by_two(), &dialect);
    ctx.insert_leaf(leaf(
        NodeCoordinate::complex("Plan", 0, 0, 1),
        "Prepare",
        "Hire two people.",
        &dialect,
    ));

    let client = client(vec![
        detail_answer("Spend 10k."),
        detail_answer("Send the press release."),
        detail_answer("Deploy on Monday."),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = TraversalOrchestrator::new(client.clone(), sink.clone());
    let (tx, mut rx) = mpsc::channel(64);

    let outcome = orchestrator
        .run(&mut ctx, None, None, tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, TraversalOutcome::Finished { generated: 3, skipped: 1 });
    assert_eq!(client.calls(), 3);
    assert_eq!(leaf_count(&ctx), 4);
    assert!(is_ordered(&ctx.messages));
    assert_eq!(ctx.checkpoint(), Checkpoint::default());

    let labels: Vec<String> = ctx
        .messages
        .iter()
        .filter_map(|m| m.coordinate().map(NodeCoordinate::label))
        .collect();
    assert_eq!(labels, vec!["Plan-1-1", "Plan-1-2", "Plan-2-1", "Plan-2-2"]);

    let saved = sink.last().unwrap();
    assert_eq!(saved.messages.len(), ctx.messages.len());

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(TraversalEvent::Started { pending: 3, .. })));
    assert!(matches!(
        events.last(),
        Some(TraversalEvent::Finished { generated: 3, skipped: 1 })
    ));
}

#[tokio::test]
async fn test_second_run_generates_nothing() {
    let dialect = dialect();
    let mut ctx = context_with(two_by_two(), &dialect);
    let client = client((0..4).map(|i| detail_answer(&format!("detail {i}"))).collect());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = TraversalOrchestrator::new(client.clone(), sink);

    let (tx, _rx) = mpsc::channel(64);
    orchestrator
        .run(&mut ctx, None, None, tx, CancellationToken::new())
        .await
        .unwrap();
    let before: Vec<String> = ctx.messages.iter().map(|m| m.id.clone()).collect();

    let (tx, _rx) = mpsc::channel(64);
    let outcome = orchestrator
        .run(&mut ctx, None, Some(Checkpoint::default()), tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, TraversalOutcome::Finished { generated: 0, skipped: 4 });
    assert_eq!(client.calls(), 4);
    let after: Vec<String> = ctx.messages.iter().map(|m| m.id.clone()).collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_cancel_commits_in_flight_node_and_resumes() {
    let dialect = dialect();
    let mut ctx = context_with(two_by_two(), &dialect);
    let token = CancellationToken::new();
    let client = Arc::new(
        ScriptedClient::new(vec![
            detail_answer("one"),
            detail_answer("two"),
            detail_answer("three"),
            detail_answer("four"),
        ])
        .cancel_during(2, token.clone()),
    );
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = TraversalOrchestrator::new(client.clone(), sink.clone());

    let (tx, mut rx) = mpsc::channel(64);
    let outcome = orchestrator
        .run(&mut ctx, None, None, tx, token)
        .await
        .unwrap();

    let resume_at = Checkpoint::new(0, 1, 0);
    assert_eq!(
        outcome,
        TraversalOutcome::Cancelled { generated: 2, skipped: 0, resume_at }
    );
    assert!(!outcome.is_finished());
    // The request issued before cancellation is committed, the next never starts.
    assert_eq!(client.calls(), 2);
    assert_eq!(leaf_count(&ctx), 2);
    assert_eq!(ctx.checkpoint(), resume_at);
    assert_eq!(sink.last().unwrap().traversal_checkpoint, resume_at);
    assert!(matches!(
        drain(&mut rx).last(),
        Some(TraversalEvent::Cancelled { .. })
    ));

    let (tx, _rx) = mpsc::channel(64);
    let outcome = orchestrator
        .run(&mut ctx, None, None, tx, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, TraversalOutcome::Finished { generated: 2, skipped: 0 });
    assert_eq!(leaf_count(&ctx), 4);
    assert!(is_ordered(&ctx.messages));
}

#[tokio::test]
async fn test_failure_halts_at_failing_node() {
    let dialect = dialect();
    let mut ctx = context_with(two_by_two(), &dialect);
    let client = client(vec![
        detail_answer("one"),
        serde_json::json!({"title": "no detail here"}),
        detail_answer("never used"),
    ]);
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = TraversalOrchestrator::new(client.clone(), sink.clone());

    let (tx, mut rx) = mpsc::channel(64);
    let err = orchestrator
        .run(&mut ctx, None, None, tx, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::GenerationFailed { operation: "generate detail", .. }));
    assert!(matches!(err.root_cause(), EngineError::MalformedResponse { .. }));
    assert_eq!(client.calls(), 2);
    assert_eq!(leaf_count(&ctx), 1);
    assert_eq!(ctx.checkpoint(), Checkpoint::new(0, 0, 1));
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, TraversalEvent::NodeFailed { .. })));
}

#[tokio::test]
async fn test_failed_save_removes_leaf_from_both_lists() {
    let dialect = dialect();
    let mut ctx = context_with(two_by_two(), &dialect);
    let history_len = ctx.history.messages.len();
    let client = client(vec![detail_answer("one")]);
    let sink = Arc::new(RecordingSink::failing_on(1));
    let orchestrator = TraversalOrchestrator::new(client, sink.clone());

    let (tx, _rx) = mpsc::channel(64);
    let err = orchestrator
        .run(&mut ctx, None, None, tx, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(leaf_count(&ctx), 0);
    assert_eq!(ctx.history.messages.len(), history_len);
    assert_eq!(sink.saves(), 0);
}

#[tokio::test]
async fn test_prompt_digest_lists_written_siblings_only() {
    let dialect = dialect();
    let mut ctx = context_with(two_by_two(), &dialect);
    ctx.insert_leaf(leaf(
        NodeCoordinate::complex("Plan", 0, 0, 0),
        "Prepare",
        "Spend 10k.",
        &dialect,
    ));
    let client = client(vec![
        detail_answer("Hire two."),
        detail_answer("Announce."),
        detail_answer("Ship."),
    ]);
    let orchestrator = TraversalOrchestrator::new(client.clone(), Arc::new(RecordingSink::default()));

    let (tx, _rx) = mpsc::channel(64);
    orchestrator
        .run(&mut ctx, None, None, tx, CancellationToken::new())
        .await
        .unwrap();

    let requests = client.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].user_prompt.contains("1Sub-step: Budget\nSpend 10k."));
    assert!(requests[0].user_prompt.contains("Sub-step 2 \"Team\""));
    // Sections do not see each other's details.
    assert!(!requests[1].user_prompt.contains("Spend 10k."));
    assert!(requests[2].user_prompt.contains("1Sub-step: Announce\nAnnounce."));
}

#[tokio::test]
async fn test_simple_branch_yields_one_node() {
    let dialect = dialect();
    let mut tree = two_by_two();
    tree.branches.push(outline_core::Branch {
        name: "Summary".to_string(),
        value: outline_core::BranchValue::SimpleValue("Launch in Q3".to_string()),
    });
    let mut ctx = context_with(tree, &dialect);
    let client = client(vec![detail_answer("Wrap up the launch.")]);
    let orchestrator = TraversalOrchestrator::new(client.clone(), Arc::new(RecordingSink::default()));

    let (tx, _rx) = mpsc::channel(64);
    let outcome = orchestrator
        .run(&mut ctx, None, Some(Checkpoint::new(1, 0, 0)), tx, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.generated(), 1);
    let summary = ctx.messages.iter().find(|m| m.is_leaf()).unwrap();
    let data = summary.detail_data().unwrap();
    assert_eq!(data.title, "Summary");
    assert!(summary.coordinate().unwrap().is_simple_node);
    assert!(client.requests()[0].user_prompt.contains("Current content: Launch in Q3"));
}

#[tokio::test]
async fn test_out_of_range_checkpoint_is_rejected() {
    let dialect = dialect();
    let mut ctx = context_with(two_by_two(), &dialect);
    let client = client(vec![]);
    let orchestrator = TraversalOrchestrator::new(client.clone(), Arc::new(RecordingSink::default()));

    let (tx, _rx) = mpsc::channel(64);
    let err = orchestrator
        .run(&mut ctx, None, Some(Checkpoint::new(0, 5, 0)), tx, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::CoordinateOutOfRange { index: 6, bound: 2, .. }
    ));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_traversal_without_configuration_fails() {
    let mut record = ConversationRecord::new();
    record.outline_tree = Some(two_by_two());
    let mut ctx = ConversationContext::new(record);
    let orchestrator = TraversalOrchestrator::new(client(vec![]), Arc::new(RecordingSink::default()));

    let (tx, _rx) = mpsc::channel(64);
    let err = orchestrator
        .run(&mut ctx, None, None, tx, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConfigurationMissing(_)));
}

#[tokio::test]
async fn test_outline_dialect_wins_over_selection() {
    let dialect = dialect();
    let mut ctx = context_with(two_by_two(), &dialect);
    let mut other = dialect.clone();
    other.id = "other".to_string();
    other.branch_names = vec!["Unrelated".to_string()];
    other.complex_branches.clear();

    let client = client((0..4).map(|i| detail_answer(&format!("d{i}"))).collect());
    let orchestrator = TraversalOrchestrator::new(client.clone(), Arc::new(RecordingSink::default()));

    let (tx, _rx) = mpsc::channel(64);
    let outcome = orchestrator
        .run(&mut ctx, Some(&other), None, tx, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.generated(), 4);
    let leaf: &Message = ctx.messages.iter().find(|m| m.is_leaf()).unwrap();
    assert_eq!(leaf.dialect.as_ref().unwrap().id, dialect.id);
}
