//! Concurrency slots plus throughput budget
//!
//! A task is admitted when it holds a concurrency slot *and* the limiter
//! grants it one unit of rate budget. The limiter is a GCRA cell with a
//! burst of one, so consecutive admissions are spaced at least
//! `60s / requests_per_minute` apart and no rolling minute ever holds more
//! than `requests_per_minute` admissions.
//!
//! A task that finds the budget exhausted gives its slot back before it
//! sleeps, so slots are only ever held by tasks that are talking to the
//! provider.

use super::policy::RatePolicy;
use crate::error::{EnrichError, EnrichResult};
use governor::clock::Clock;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct Admission {
    slots: Semaphore,
    max_concurrent: usize,
    limiter: DefaultDirectRateLimiter,
}

impl Admission {
    pub fn new(policy: &RatePolicy) -> EnrichResult<Self> {
        let per_minute = NonZeroU32::new(policy.requests_per_minute).ok_or_else(|| {
            EnrichError::Configuration("requests_per_minute must be greater than 0".to_string())
        })?;
        if policy.max_concurrent == 0 {
            return Err(EnrichError::Configuration(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }

        let quota = Quota::per_minute(per_minute).allow_burst(NonZeroU32::MIN);
        debug!(
            max_concurrent = policy.max_concurrent,
            min_interval_ms = policy.min_interval().as_millis() as u64,
            "Admission configured"
        );

        Ok(Self {
            slots: Semaphore::new(policy.max_concurrent),
            max_concurrent: policy.max_concurrent,
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Wait for a slot and rate budget
    ///
    /// Returns `None` once `cancel` fires; the returned permit must be held
    /// for the duration of the provider call.
    pub async fn admit(&self, cancel: &CancellationToken) -> Option<SemaphorePermit<'_>> {
        loop {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                acquired = self.slots.acquire() => match acquired {
                    Ok(permit) => permit,
                    Err(_) => return None,
                },
            };

            match self.limiter.check() {
                Ok(()) => return Some(permit),
                Err(not_until) => {
                    drop(permit);
                    let wait = not_until.wait_time_from(self.limiter.clock().now());
                    debug!(
                        wait_ms = wait.as_millis() as u64,
                        "Rate budget exhausted, waiting without a slot"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// Slots not currently held
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
