//! Task dispatcher
//!
//! Keeps a bounded window of classification futures running on a
//! `FuturesUnordered`, refilling it as tasks finish. Concurrency against
//! the provider is enforced by admission, so the window only has to stay
//! large enough to keep every slot busy.
//!
//! Completion order is arbitrary; reports are stored by submission index
//! and returned in submission order.

use super::checkpoint::CheckpointEntry;
use super::retry::RetryError;
use super::RunContext;
use crate::error::EnrichResult;
use crate::models::{
    ClassificationTask, NameRecord, TaskOutcome, TaskReport, TerminalOutcome,
};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use nameseek_common::events::EnrichEvent;
use std::time::Instant;
use tracing::{error, info, warn};

/// Futures kept in flight per concurrency slot
const DISPATCH_WINDOW_FACTOR: usize = 2;

/// Classify `records` under the run's policy
///
/// Every returned report corresponds to the record at the same position in
/// `records`. Terminal reports have already been checkpointed when this
/// returns. Records not finished because of cancellation are reported as
/// `Interrupted` and have no checkpoint entry.
///
/// A checkpoint write failure cancels the run, waits for in-flight tasks
/// and returns the error.
pub async fn dispatch(ctx: &RunContext, records: Vec<NameRecord>) -> EnrichResult<Vec<TaskReport>> {
    let total = records.len();
    let started = Instant::now();
    let window = ctx.policy.max_concurrent.saturating_mul(DISPATCH_WINDOW_FACTOR).max(1);

    info!(
        run_id = %ctx.run_id,
        total,
        max_concurrent = ctx.policy.max_concurrent,
        requests_per_minute = ctx.policy.requests_per_minute,
        "Dispatching classification tasks"
    );

    let mut reports: Vec<Option<TaskReport>> = vec![None; total];
    let mut pending = records.iter().cloned().enumerate();
    let mut tasks = FuturesUnordered::new();
    let mut completed = 0usize;
    let mut abort = None;
    let mut cancel_logged = false;

    // Seed initial window
    for _ in 0..window {
        if let Some((idx, record)) = pending.next() {
            tasks.push(run_task(ctx, idx, record));
        }
    }

    while let Some((idx, result)) = tasks.next().await {
        match result {
            Ok(report) => {
                if let TaskOutcome::Terminal(outcome) = &report.outcome {
                    completed += 1;
                    ctx.events.emit_lossy(EnrichEvent::TaskCompleted {
                        run_id: ctx.run_id,
                        name: report.record.key.to_string(),
                        succeeded: outcome.is_success(),
                        attempts: report.attempts,
                        completed,
                        total,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        timestamp: Utc::now(),
                    });
                }
                reports[idx] = Some(report);
            }
            Err(e) => {
                error!(run_id = %ctx.run_id, error = %e, "Checkpoint write failed, aborting run");
                ctx.cancel.cancel();
                if abort.is_none() {
                    abort = Some(e);
                }
            }
        }

        if ctx.cancel.is_cancelled() {
            if !cancel_logged {
                cancel_logged = true;
                warn!(
                    run_id = %ctx.run_id,
                    in_flight = tasks.len(),
                    "Cancellation requested, no new tasks will start"
                );
                ctx.events.emit_lossy(EnrichEvent::RunCancelling {
                    run_id: ctx.run_id,
                    in_flight: tasks.len(),
                    timestamp: Utc::now(),
                });
            }
            continue;
        }

        // Refill the window
        if let Some((idx, record)) = pending.next() {
            tasks.push(run_task(ctx, idx, record));
        }
    }

    if let Some(e) = abort {
        return Err(e);
    }

    let reports: Vec<TaskReport> = reports
        .into_iter()
        .zip(records)
        .map(|(report, record)| report.unwrap_or_else(|| TaskReport::interrupted(record, 0)))
        .collect();

    info!(
        run_id = %ctx.run_id,
        completed,
        interrupted = total - completed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Dispatch finished"
    );

    Ok(reports)
}

/// Classify one record and checkpoint its terminal outcome
async fn run_task(
    ctx: &RunContext,
    idx: usize,
    record: NameRecord,
) -> (usize, EnrichResult<TaskReport>) {
    let mut task = ClassificationTask::new(record);

    let outcome = match ctx.retry.call(ctx, &mut task).await {
        Ok(result) => TerminalOutcome::Succeeded { result },
        Err(RetryError::Fatal(failure)) | Err(RetryError::Exhausted(failure)) => {
            TerminalOutcome::failed(failure)
        }
        Err(RetryError::Interrupted) => {
            return (idx, Ok(TaskReport::interrupted(task.record, task.attempt)));
        }
    };

    let entry = CheckpointEntry::new(ctx.run_id, &task.record.key, task.attempt, outcome.clone());
    if let Err(e) = ctx.checkpoint.append(&entry).await {
        return (idx, Err(e));
    }

    if let Some(result) = outcome.result() {
        info!(
            name = %task.record.key,
            attempts = task.attempt,
            origin = %result.origin_category,
            "Name classified"
        );
    }

    (
        idx,
        Ok(TaskReport {
            record: task.record,
            attempts: task.attempt,
            outcome: TaskOutcome::Terminal(outcome),
        }),
    )
}
