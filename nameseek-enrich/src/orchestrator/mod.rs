//! Bulk enrichment orchestrator
//!
//! Data flow for one run:
//!
//! ```text
//! base dataset -> distinct keys -> selection -> checkpoint filter
//!     -> dispatcher (admission + retry controller + adapter, checkpoint append)
//!     -> merger (checkpoint entries x base rows) -> enriched output
//! ```
//!
//! All shared state of a run lives in [`RunContext`]; nothing is global.

pub mod admission;
pub mod checkpoint;
pub mod dispatcher;
pub mod merger;
pub mod policy;
pub mod registry;
pub mod retry;
pub mod selection;
pub mod summary;

use crate::dataset::{self, BaseDataset};
use crate::error::{EnrichError, EnrichResult};
use crate::models::{NameKey, NameRecord, RunConfiguration, TaskOutcome, TerminalOutcome};
use crate::services::ProviderAdapter;
use admission::Admission;
use checkpoint::{CheckpointEntry, CheckpointStore};
use chrono::Utc;
use nameseek_common::events::{EnrichEvent, EventBus};
use policy::RatePolicy;
use registry::EnrichmentRegistry;
use retry::RetryController;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use summary::{FailedName, RunSummary};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything a running task needs, passed explicitly
pub struct RunContext {
    pub run_id: Uuid,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub policy: RatePolicy,
    pub admission: Admission,
    pub retry: RetryController,
    pub checkpoint: CheckpointStore,
    pub events: EventBus,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        policy: RatePolicy,
        retry: RetryController,
        checkpoint: CheckpointStore,
        events: EventBus,
        cancel: CancellationToken,
    ) -> EnrichResult<Self> {
        let admission = Admission::new(&policy)?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            adapter,
            policy,
            admission,
            retry,
            checkpoint,
            events,
            cancel,
        })
    }
}

/// One enrichment run from base dataset to enriched output
pub struct EnrichmentRun {
    config: RunConfiguration,
    adapter: Arc<dyn ProviderAdapter>,
    registry: EnrichmentRegistry,
    policy_override: Option<RatePolicy>,
    events: EventBus,
    cancel: CancellationToken,
}

impl EnrichmentRun {
    pub fn new(config: RunConfiguration, adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            config,
            adapter,
            registry: EnrichmentRegistry::default(),
            policy_override: None,
            events: EventBus::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_registry(mut self, registry: EnrichmentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use `policy` instead of the configured tier's limits
    ///
    /// The configuration is still validated against the tier table.
    pub fn with_rate_policy(mut self, policy: RatePolicy) -> Self {
        self.policy_override = Some(policy);
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Token that cancels the run when triggered
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the run
    ///
    /// Configuration, dataset and checkpoint errors abort before or during
    /// dispatch and are returned as `Err`. Per-name failures never are;
    /// they show up in the summary. The output file is written for
    /// completed and cancelled runs alike.
    pub async fn execute(self) -> EnrichResult<RunSummary> {
        let started = Instant::now();
        let config = self.config;
        let tier_policy = config.validate()?;
        let policy = self.policy_override.unwrap_or(tier_policy);

        let dataset = {
            let path = config.input_path.clone();
            let name_column = config.name_column.clone();
            let gender_column = config.gender_column.clone();
            tokio::task::spawn_blocking(move || {
                BaseDataset::load(&path, &name_column, gender_column.as_deref())
            })
            .await
            .map_err(|e| EnrichError::Dataset(format!("dataset loader panicked: {}", e)))??
        };

        let selected = selection::select(
            dataset.distinct_records(),
            config.mode,
            config.count,
            config.seed,
        );
        let selected_keys: HashSet<NameKey> = selected.iter().map(|r| r.key.clone()).collect();

        let checkpoint_path = config.checkpoint_path();
        let checkpoint = CheckpointStore::open(&checkpoint_path).await?;

        let mut remaining: Vec<NameRecord> = Vec::with_capacity(selected.len());
        for record in &selected {
            if !checkpoint.has(&record.key).await {
                remaining.push(record.clone());
            }
        }
        let skipped = selected.len() - remaining.len();

        let ctx = RunContext::new(
            self.adapter,
            policy,
            RetryController::new(config.max_attempts, config.backoff),
            checkpoint,
            self.events,
            self.cancel,
        )?;

        info!(
            run_id = %ctx.run_id,
            provider = %config.provider,
            model = %config.model,
            tier = %ctx.policy.tier,
            selected = selected.len(),
            skipped,
            to_dispatch = remaining.len(),
            "Enrichment run started"
        );
        ctx.events.emit_lossy(EnrichEvent::RunStarted {
            run_id: ctx.run_id,
            selected: selected.len(),
            skipped,
            to_dispatch: remaining.len(),
            provider: config.provider.to_string(),
            tier: ctx.policy.tier.clone(),
            timestamp: Utc::now(),
        });

        let reports = match dispatcher::dispatch(&ctx, remaining).await {
            Ok(reports) => reports,
            Err(e) => {
                error!(run_id = %ctx.run_id, error = %e, "Enrichment run aborted");
                return Err(e);
            }
        };

        let mut succeeded = 0;
        let mut failed = 0;
        let mut interrupted = 0;
        let mut dispatched_keys = HashSet::new();
        for report in &reports {
            match &report.outcome {
                TaskOutcome::Terminal(TerminalOutcome::Succeeded { .. }) => succeeded += 1,
                TaskOutcome::Terminal(TerminalOutcome::Failed { .. }) => failed += 1,
                TaskOutcome::Interrupted => interrupted += 1,
            }
            dispatched_keys.insert(report.record.key.clone());
        }

        let entries: Vec<CheckpointEntry> = ctx
            .checkpoint
            .all_entries()
            .await?
            .into_iter()
            .filter(|entry| selected_keys.contains(&entry.key()))
            .collect();

        let failures: Vec<FailedName> = entries
            .iter()
            .filter_map(|entry| {
                let failure = entry.outcome.failure()?;
                let key = entry.key();
                let from_checkpoint = !dispatched_keys.contains(&key);
                Some(FailedName {
                    key,
                    kind: failure.kind,
                    message: failure.message,
                    attempts: entry.attempts,
                    from_checkpoint,
                })
            })
            .collect();

        let mut merged = merger::merge(&dataset, &entries, &self.registry);
        if config.only_selected {
            merged.retain_keys(&selected_keys);
        }
        let rows_written = merged.rows.len();

        {
            let output_path = config.output_path.clone();
            let headers = merged.headers;
            let rows = merged.rows;
            tokio::task::spawn_blocking(move || {
                dataset::write_csv_atomic(&output_path, &headers, &rows)
            })
            .await
            .map_err(|e| EnrichError::Dataset(format!("output writer panicked: {}", e)))??;
        }

        let cancelled = ctx.cancel.is_cancelled();
        let summary = RunSummary {
            run_id: ctx.run_id,
            provider: config.provider.to_string(),
            model: config.model.clone(),
            tier: ctx.policy.tier.clone(),
            selected: selected.len(),
            succeeded,
            failed,
            skipped,
            interrupted,
            failures,
            conflicts: merged.conflicts,
            rows_written,
            output_path: config.output_path.clone(),
            checkpoint_path,
            elapsed: started.elapsed(),
            cancelled,
        };

        ctx.events.emit_lossy(EnrichEvent::RunFinished {
            run_id: ctx.run_id,
            succeeded,
            failed,
            skipped,
            interrupted,
            cancelled,
            timestamp: Utc::now(),
        });

        if summary.is_complete() {
            info!(
                run_id = %ctx.run_id,
                succeeded,
                failed,
                skipped,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "Enrichment run completed"
            );
        } else {
            warn!(
                run_id = %ctx.run_id,
                succeeded,
                failed,
                skipped,
                interrupted,
                "Enrichment run interrupted; rerun with the same parameters to resume"
            );
        }

        Ok(summary)
    }
}
