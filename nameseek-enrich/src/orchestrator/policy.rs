//! Rate/concurrency tier table
//!
//! One classification issues three provider requests (origin first, then
//! description and pronunciation together), so ceilings are expressed in
//! classifications per minute.

use crate::error::{EnrichError, EnrichResult};
use crate::models::Provider;
use std::time::Duration;

struct TierSpec {
    tier: &'static str,
    max_concurrent: usize,
    requests_per_minute: u32,
    timeout_secs: u64,
}

const GEMINI_TIERS: &[TierSpec] = &[
    TierSpec {
        tier: "free",
        max_concurrent: 10,
        requests_per_minute: 3,
        timeout_secs: 60,
    },
    TierSpec {
        tier: "level1",
        max_concurrent: 300,
        requests_per_minute: 330,
        timeout_secs: 60,
    },
];

const OPENAI_TIERS: &[TierSpec] = &[
    TierSpec {
        tier: "free",
        max_concurrent: 20,
        requests_per_minute: 1,
        timeout_secs: 60,
    },
    TierSpec {
        tier: "level1",
        max_concurrent: 100,
        requests_per_minute: 160,
        timeout_secs: 60,
    },
];

fn tiers(provider: Provider) -> &'static [TierSpec] {
    match provider {
        Provider::Gemini => GEMINI_TIERS,
        Provider::OpenAi => OPENAI_TIERS,
    }
}

/// Tier identifiers known for a provider
pub fn tier_names(provider: Provider) -> Vec<&'static str> {
    tiers(provider).iter().map(|spec| spec.tier).collect()
}

/// Limits applied to one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePolicy {
    pub provider: Provider,
    pub tier: String,
    /// Classifications allowed in flight at once
    pub max_concurrent: usize,
    /// Classifications started per rolling minute
    pub requests_per_minute: u32,
    /// Bound on a single adapter call
    pub request_timeout: Duration,
}

impl RatePolicy {
    /// Look up `tier` in the provider's table
    ///
    /// `max_concurrent_override` replaces the table's concurrency only.
    pub fn resolve(
        provider: Provider,
        tier: &str,
        max_concurrent_override: Option<usize>,
    ) -> EnrichResult<Self> {
        let wanted = tier.trim().to_lowercase();
        let spec = tiers(provider)
            .iter()
            .find(|spec| spec.tier == wanted)
            .ok_or_else(|| {
                EnrichError::Configuration(format!(
                    "tier '{}' does not exist for provider {} (expected one of: {})",
                    tier,
                    provider,
                    tier_names(provider).join(", ")
                ))
            })?;

        let max_concurrent = match max_concurrent_override {
            Some(0) => {
                return Err(EnrichError::Configuration(
                    "max_concurrent override must be greater than 0".to_string(),
                ))
            }
            Some(n) => n,
            None => spec.max_concurrent,
        };

        Ok(Self {
            provider,
            tier: spec.tier.to_string(),
            max_concurrent,
            requests_per_minute: spec.requests_per_minute,
            request_timeout: Duration::from_secs(spec.timeout_secs),
        })
    }

    /// Ad hoc policy outside the tier table
    pub fn custom(
        provider: Provider,
        max_concurrent: usize,
        requests_per_minute: u32,
        request_timeout: Duration,
    ) -> EnrichResult<Self> {
        if max_concurrent == 0 || requests_per_minute == 0 {
            return Err(EnrichError::Configuration(
                "max_concurrent and requests_per_minute must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            provider,
            tier: "custom".to_string(),
            max_concurrent,
            requests_per_minute,
            request_timeout,
        })
    }

    /// Minimum spacing between two admissions
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(60) / self.requests_per_minute.max(1)
    }
}
