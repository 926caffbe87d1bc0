//! Retry controller
//!
//! Wraps the adapter call for one task with admission, a per-call timeout,
//! response validation and bounded exponential backoff.
//!
//! Failure handling by class:
//! - Transient: retried until `max_attempts` calls have been made
//! - Validation: retried once, fatal on the second consecutive occurrence
//! - Fatal: surfaced immediately

use super::RunContext;
use crate::error::{FailureClass, ProviderError};
use crate::models::{ClassificationResult, ClassificationTask, TaskFailure, TaskState};
use crate::services::response_validator;
use chrono::Utc;
use nameseek_common::events::EnrichEvent;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Exponential backoff: `base * 2^(n-1)` after the n-th failed call, capped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl BackoffSchedule {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before the next call after `failed_calls` failures
    ///
    /// A provider `Retry-After` hint lengthens the delay but never past `max`.
    pub fn delay(&self, failed_calls: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = failed_calls.saturating_sub(1).min(20);
        let computed = self
            .base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max);
        match retry_after {
            Some(hint) => computed.max(hint).min(self.max),
            None => computed,
        }
    }
}

/// Why a task did not produce a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Non-retryable failure (auth, invalid input, repeated invalid output)
    Fatal(TaskFailure),
    /// Transient failures used up every attempt
    Exhausted(TaskFailure),
    /// Run cancelled before a terminal outcome
    Interrupted,
}

impl RetryError {
    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            RetryError::Fatal(failure) | RetryError::Exhausted(failure) => Some(failure),
            RetryError::Interrupted => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryController {
    max_attempts: u32,
    backoff: BackoffSchedule,
}

impl RetryController {
    pub fn new(max_attempts: u32, backoff: BackoffSchedule) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> BackoffSchedule {
        self.backoff
    }

    /// Drive `task` to a terminal state
    ///
    /// `task.attempt` counts every adapter call made, so on return it is the
    /// number of attempts to record.
    pub async fn call(
        &self,
        ctx: &RunContext,
        task: &mut ClassificationTask,
    ) -> Result<ClassificationResult, RetryError> {
        let key = task.record.key.clone();
        let mut consecutive_invalid = 0u32;

        loop {
            task.state = TaskState::Pending;
            let Some(permit) = ctx.admission.admit(&ctx.cancel).await else {
                debug!(name = %key, attempt = task.attempt, "Admission interrupted by cancellation");
                return Err(RetryError::Interrupted);
            };

            task.attempt += 1;
            task.state = TaskState::InFlight;

            let outcome = match tokio::time::timeout(
                ctx.policy.request_timeout,
                ctx.adapter.classify(&key),
            )
            .await
            {
                Ok(Ok(raw)) => response_validator::validate(&raw, &key).map_err(ProviderError::from),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ProviderError::Timeout),
            };
            drop(permit);

            let err = match outcome {
                Ok(result) => {
                    task.state = TaskState::Succeeded;
                    return Ok(result);
                }
                Err(e) => e,
            };

            let failure = TaskFailure::from(&err);
            match err.class() {
                FailureClass::Fatal => {
                    task.state = TaskState::Failed;
                    error!(name = %key, attempt = task.attempt, error = %err, "Permanent failure");
                    return Err(RetryError::Fatal(failure));
                }
                FailureClass::Validation => {
                    consecutive_invalid += 1;
                    if consecutive_invalid >= 2 {
                        task.state = TaskState::Failed;
                        error!(
                            name = %key,
                            attempt = task.attempt,
                            error = %err,
                            "Second consecutive invalid response"
                        );
                        return Err(RetryError::Fatal(failure));
                    }
                }
                FailureClass::Transient => consecutive_invalid = 0,
            }

            if task.attempt >= self.max_attempts {
                task.state = TaskState::Failed;
                error!(
                    name = %key,
                    attempts = task.attempt,
                    error = %err,
                    "Retries exhausted"
                );
                return Err(RetryError::Exhausted(failure));
            }

            let delay = self.backoff.delay(task.attempt, err.retry_after());
            warn!(
                name = %key,
                attempt = task.attempt,
                max_attempts = self.max_attempts,
                backoff_ms = delay.as_millis() as u64,
                error = %err,
                "Classification failed, retrying"
            );
            ctx.events.emit_lossy(EnrichEvent::TaskRetrying {
                run_id: ctx.run_id,
                name: key.to_string(),
                attempt: task.attempt,
                delay_ms: delay.as_millis() as u64,
                error: err.to_string(),
                timestamp: Utc::now(),
            });

            task.state = TaskState::Pending;
            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    debug!(name = %key, "Backoff interrupted by cancellation");
                    return Err(RetryError::Interrupted);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
