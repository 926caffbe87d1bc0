//! Dispatcher, admission and retry behaviour against a scripted adapter

mod helpers;

use helpers::*;
use nameseek_enrich::error::{FailureKind, ProviderError};
use nameseek_enrich::models::{OriginCategory, Provider, TaskOutcome, TerminalOutcome};
use nameseek_enrich::orchestrator::checkpoint::CheckpointStore;
use nameseek_enrich::orchestrator::dispatcher::dispatch;
use nameseek_enrich::orchestrator::policy::RatePolicy;
use std::time::Duration;
use tempfile::TempDir;

fn failure_kind(outcome: &TaskOutcome) -> Option<FailureKind> {
    match outcome {
        TaskOutcome::Terminal(TerminalOutcome::Failed { kind, .. }) => Some(*kind),
        _ => None,
    }
}

#[tokio::test]
async fn test_reports_follow_submission_order() {
    let dir = TempDir::new().unwrap();
    let names = ["N0", "N1", "N2", "N3", "N4", "N5"];

    // Earlier submissions take longer, so completions arrive reversed
    let mut adapter = MockAdapter::new();
    for (idx, name) in names.iter().enumerate() {
        adapter = adapter.delay_for(name, Duration::from_millis(20 * (names.len() - idx) as u64));
    }
    let adapter = adapter.into_arc();

    let ctx = context(dir.path(), adapter.clone(), fast_policy(names.len()), fast_retry(3)).await;
    let reports = dispatch(&ctx, records(&names)).await.unwrap();

    let reported: Vec<&str> = reports.iter().map(|r| r.record.key.name.as_str()).collect();
    assert_eq!(reported, names);
    assert!(reports
        .iter()
        .all(|r| matches!(r.outcome, TaskOutcome::Terminal(TerminalOutcome::Succeeded { .. }))));

    // Checkpoint holds one entry per record, appended in completion order
    let entries = ctx.checkpoint.all_entries().await.unwrap();
    assert_eq!(entries.len(), names.len());
    assert_eq!(entries.first().unwrap().name, "N5");
}

#[tokio::test]
async fn test_concurrency_never_exceeds_slots() {
    let dir = TempDir::new().unwrap();
    let adapter = MockAdapter::new()
        .with_delay(Duration::from_millis(30))
        .into_arc();
    let names: Vec<String> = (0..8).map(|i| format!("Nombre{}", i)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let ctx = context(dir.path(), adapter.clone(), fast_policy(2), fast_retry(3)).await;
    let reports = dispatch(&ctx, records(&names)).await.unwrap();

    assert_eq!(reports.len(), 8);
    assert_eq!(adapter.call_count(), 8);
    assert_eq!(adapter.max_in_flight(), 2);
}

#[tokio::test]
async fn test_calls_respect_requests_per_minute() {
    let dir = TempDir::new().unwrap();
    let adapter = MockAdapter::new().into_arc();

    // 600 per minute: one admission every 100ms, regardless of free slots
    let policy = RatePolicy::custom(Provider::Gemini, 4, 600, Duration::from_secs(2)).unwrap();
    let ctx = context(dir.path(), adapter.clone(), policy, fast_retry(3)).await;
    dispatch(&ctx, records(&["A", "B", "C", "D", "E"])).await.unwrap();

    let mut instants = adapter.call_instants();
    instants.sort();
    assert_eq!(instants.len(), 5);
    for pair in instants.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(gap >= Duration::from_millis(90), "calls only {:?} apart", gap);
    }
    assert!(instants[4].duration_since(instants[0]) >= Duration::from_millis(380));
}

#[tokio::test]
async fn test_persistent_timeout_is_attempted_max_attempts_times() {
    let dir = TempDir::new().unwrap();
    let adapter = MockAdapter::new()
        .script(
            "Lento",
            vec![
                Err(ProviderError::Timeout),
                Err(ProviderError::Timeout),
                Err(ProviderError::Timeout),
                Err(ProviderError::Timeout),
                Err(ProviderError::Timeout),
            ],
        )
        .into_arc();

    let ctx = context(dir.path(), adapter.clone(), fast_policy(2), fast_retry(3)).await;
    let reports = dispatch(&ctx, records(&["Lento", "Ana"])).await.unwrap();

    assert_eq!(adapter.calls_for("Lento"), 3);
    assert_eq!(reports[0].attempts, 3);
    assert_eq!(failure_kind(&reports[0].outcome), Some(FailureKind::Timeout));

    // Failure of one name does not affect the others
    assert!(matches!(
        reports[1].outcome,
        TaskOutcome::Terminal(TerminalOutcome::Succeeded { .. })
    ));
    assert_eq!(ctx.checkpoint.len().await, 2);
}

#[tokio::test]
async fn test_slow_adapter_hits_request_timeout() {
    let dir = TempDir::new().unwrap();
    let adapter = MockAdapter::new()
        .with_delay(Duration::from_millis(300))
        .into_arc();
    let policy = RatePolicy::custom(Provider::Gemini, 1, 60_000, Duration::from_millis(50)).unwrap();

    let ctx = context(dir.path(), adapter.clone(), policy, fast_retry(2)).await;
    let reports = dispatch(&ctx, records(&["Ana"])).await.unwrap();

    assert_eq!(adapter.call_count(), 2);
    assert_eq!(failure_kind(&reports[0].outcome), Some(FailureKind::Timeout));
}

#[tokio::test]
async fn test_rate_limited_then_success_records_two_attempts() {
    let dir = TempDir::new().unwrap();
    let adapter = MockAdapter::new()
        .script(
            "Ana",
            vec![Err(ProviderError::RateLimited {
                retry_after: Some(Duration::from_millis(2)),
            })],
        )
        .into_arc();

    let ctx = context(dir.path(), adapter.clone(), fast_policy(1), fast_retry(4)).await;
    let reports = dispatch(&ctx, records(&["Ana"])).await.unwrap();

    assert_eq!(adapter.calls_for("Ana"), 2);
    assert_eq!(reports[0].attempts, 2);

    let entries = ctx.checkpoint.all_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attempts, 2);
    assert_eq!(
        entries[0].outcome.result().unwrap().origin_category,
        OriginCategory::Espanol
    );
}

#[tokio::test]
async fn test_invalid_response_is_retried_once() {
    let dir = TempDir::new().unwrap();
    let adapter = MockAdapter::new()
        .script("Ana", vec![Ok(invalid_raw())])
        .script("Luis", vec![Ok(invalid_raw()), Ok(invalid_raw()), Ok(invalid_raw())])
        .into_arc();

    let ctx = context(dir.path(), adapter.clone(), fast_policy(2), fast_retry(4)).await;
    let reports = dispatch(&ctx, records(&["Ana", "Luis"])).await.unwrap();

    // One bad reply is absorbed
    assert_eq!(adapter.calls_for("Ana"), 2);
    assert!(matches!(
        reports[0].outcome,
        TaskOutcome::Terminal(TerminalOutcome::Succeeded { .. })
    ));

    // Two consecutive bad replies are permanent despite attempts left
    assert_eq!(adapter.calls_for("Luis"), 2);
    assert_eq!(
        failure_kind(&reports[1].outcome),
        Some(FailureKind::InvalidResponse)
    );
}

#[tokio::test]
async fn test_auth_error_is_not_retried() {
    let dir = TempDir::new().unwrap();
    let adapter = MockAdapter::new()
        .script("Ana", vec![Err(ProviderError::AuthError("bad key".to_string()))])
        .into_arc();

    let ctx = context(dir.path(), adapter.clone(), fast_policy(1), fast_retry(4)).await;
    let reports = dispatch(&ctx, records(&["Ana"])).await.unwrap();

    assert_eq!(adapter.call_count(), 1);
    assert_eq!(failure_kind(&reports[0].outcome), Some(FailureKind::AuthError));
}

#[tokio::test]
async fn test_cancellation_leaves_no_partial_entries() {
    let dir = TempDir::new().unwrap();
    let names: Vec<String> = (0..10).map(|i| format!("Nombre{}", i)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let ctx = {
        let cancel = tokio_util::sync::CancellationToken::new();
        let adapter = MockAdapter::new().cancel_after(3, cancel.clone()).into_arc();
        let checkpoint = CheckpointStore::open(dir.path().join("checkpoint.jsonl"))
            .await
            .unwrap();
        nameseek_enrich::RunContext::new(
            adapter,
            fast_policy(1),
            fast_retry(3),
            checkpoint,
            nameseek_common::events::EventBus::default(),
            cancel,
        )
        .unwrap()
    };

    let reports = dispatch(&ctx, records(&names)).await.unwrap();

    let terminal = reports.iter().filter(|r| !r.is_interrupted()).count();
    assert_eq!(terminal, 3);
    assert_eq!(reports.len(), 10);

    // Exactly the finished names are checkpointed, nothing else
    let reopened = CheckpointStore::open(dir.path().join("checkpoint.jsonl"))
        .await
        .unwrap();
    assert_eq!(reopened.len().await, 3);
    for report in &reports {
        assert_eq!(reopened.has(&report.record.key).await, !report.is_interrupted());
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_checkpoint_write_failure_aborts_dispatch() {
    let names: Vec<String> = (0..10).map(|i| format!("Nombre{}", i)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let adapter = MockAdapter::new().into_arc();

    // Every write to /dev/full fails with ENOSPC
    let checkpoint = CheckpointStore::open("/dev/full").await.unwrap();
    let ctx = nameseek_enrich::RunContext::new(
        adapter.clone(),
        fast_policy(1),
        fast_retry(3),
        checkpoint,
        nameseek_common::events::EventBus::default(),
        tokio_util::sync::CancellationToken::new(),
    )
    .unwrap();

    let result = dispatch(&ctx, records(&names)).await;

    assert!(matches!(result, Err(nameseek_enrich::error::EnrichError::CheckpointWrite { .. })));
    assert!(ctx.cancel.is_cancelled());
    // Only the initial window ever reached the provider
    assert!(adapter.call_count() <= 2, "{} calls after abort", adapter.call_count());
    assert!(ctx.checkpoint.is_empty().await);
}
