//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use nameseek_common::events::EventBus;
use nameseek_enrich::error::ProviderError;
use nameseek_enrich::models::{
    Gender, NameKey, NameRecord, Provider, RawClassification, RunConfiguration,
};
use nameseek_enrich::orchestrator::checkpoint::CheckpointStore;
use nameseek_enrich::orchestrator::policy::RatePolicy;
use nameseek_enrich::orchestrator::retry::{BackoffSchedule, RetryController};
use nameseek_enrich::services::ProviderAdapter;
use nameseek_enrich::RunContext;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

type Reply = Result<RawClassification, ProviderError>;

/// One recorded adapter call
#[derive(Debug, Clone)]
pub struct Call {
    pub name: String,
    pub at: Instant,
}

/// Scripted provider adapter
///
/// Names without a script (or whose script ran out) get a valid response.
#[derive(Default)]
pub struct MockAdapter {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    delays: HashMap<String, Duration>,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies for successive calls for `name`
    pub fn script(self, name: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), replies.into_iter().collect());
        self
    }

    /// Latency of every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Latency of calls for one name
    pub fn delay_for(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    /// Cancel `token` while serving the `n`-th call
    pub fn cancel_after(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.name == name)
            .count()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.name.clone()).collect()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|c| c.at).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model(&self) -> &str {
        "mock"
    }

    async fn classify(&self, key: &NameKey) -> Result<RawClassification, ProviderError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                name: key.name.clone(),
                at: Instant::now(),
            });
            calls.len()
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(self.in_flight.clone());
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some((n, token)) = &self.cancel_after {
            if call_number == *n {
                token.cancel();
            }
        }

        let delay = self.delays.get(&key.name).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key.name)
            .and_then(|replies| replies.pop_front());
        scripted.unwrap_or_else(|| Ok(valid_raw(&key.name)))
    }
}

/// Response that passes validation
pub fn valid_raw(name: &str) -> RawClassification {
    RawClassification {
        origin: if name == "Wilhelm" { "Alemán" } else { "Español" }.to_string(),
        description: format!("Nombre de uso frecuente. {} tiene variantes en varios idiomas.", name),
        pronunciation_native: "muy fácil".to_string(),
        pronunciation_foreign: "fácil".to_string(),
        pronunciation_explanation: "Sin sonidos problemáticos.".to_string(),
    }
}

/// Response that fails origin validation
pub fn invalid_raw() -> RawClassification {
    RawClassification {
        origin: "Marciano".to_string(),
        ..valid_raw("x")
    }
}

/// Policy fast enough not to slow tests down
pub fn fast_policy(max_concurrent: usize) -> RatePolicy {
    RatePolicy::custom(Provider::Gemini, max_concurrent, 60_000, Duration::from_secs(2)).unwrap()
}

pub fn fast_backoff() -> BackoffSchedule {
    BackoffSchedule::new(Duration::from_millis(1), Duration::from_millis(5))
}

pub fn fast_retry(max_attempts: u32) -> RetryController {
    RetryController::new(max_attempts, fast_backoff())
}

pub fn records(names: &[&str]) -> Vec<NameRecord> {
    names
        .iter()
        .enumerate()
        .map(|(row, name)| NameRecord::new(NameKey::new(name, Gender::Unknown), row))
        .collect()
}

/// Run context over a checkpoint file in `dir`
pub async fn context(
    dir: &Path,
    adapter: Arc<dyn ProviderAdapter>,
    policy: RatePolicy,
    retry: RetryController,
) -> RunContext {
    let checkpoint = CheckpointStore::open(dir.join("checkpoint.jsonl")).await.unwrap();
    RunContext::new(
        adapter,
        policy,
        retry,
        checkpoint,
        EventBus::default(),
        CancellationToken::new(),
    )
    .unwrap()
}

pub fn write_input(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("names.csv");
    std::fs::write(&path, contents).unwrap();
    path
}

/// Base dataset with one `Nombre` column and an `Id` passthrough column
pub fn write_names(dir: &Path, names: &[&str]) -> PathBuf {
    let mut contents = String::from("Id,Nombre\n");
    for (idx, name) in names.iter().enumerate() {
        contents.push_str(&format!("{},{}\n", idx + 1, name));
    }
    write_input(dir, &contents)
}

pub fn run_config(input: &Path, output: &Path, count: usize) -> RunConfiguration {
    let mut config = RunConfiguration::new(input, output);
    config.count = count;
    config.backoff = fast_backoff();
    config
}

/// Output file as (headers, rows)
pub fn read_output(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

pub fn column(headers: &[String], name: &str) -> usize {
    headers.iter().position(|h| h == name).unwrap()
}
