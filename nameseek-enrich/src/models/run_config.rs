//! Run configuration
//!
//! Built once by the CLI/config layer, validated before anything is
//! dispatched and never mutated afterwards.

use crate::error::{EnrichError, EnrichResult};
use crate::orchestrator::policy::RatePolicy;
use crate::orchestrator::retry::BackoffSchedule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Supported AI backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
        }
    }

    /// Models accepted for this provider; the first one is the default
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Provider::Gemini => &["gemini-2.5-flash", "gemini-2.5-pro"],
            Provider::OpenAi => &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini"],
        }
    }

    pub fn default_model(&self) -> &'static str {
        self.models()[0]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" | "open-ai" | "gpt" => Ok(Provider::OpenAi),
            other => Err(format!("unknown provider '{}' (expected gemini or openai)", other)),
        }
    }
}

/// How names are picked from the base dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// First `count` distinct names in dataset order
    Sequential,
    /// Uniform sample of `count` distinct names without replacement
    Random,
    /// Every distinct name; requires explicit confirmation
    All,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SelectionMode::Sequential => "sequential",
            SelectionMode::Random => "random",
            SelectionMode::All => "all",
        })
    }
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" | "seq" => Ok(SelectionMode::Sequential),
            "random" => Ok(SelectionMode::Random),
            "all" => Ok(SelectionMode::All),
            other => Err(format!(
                "unknown mode '{}' (expected sequential, random or all)",
                other
            )),
        }
    }
}

/// Complete configuration of one enrichment run
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub mode: SelectionMode,
    /// Ignored when `mode` is `All`
    pub count: usize,
    /// Sampling seed; only meaningful for `Random`
    pub seed: Option<u64>,
    pub provider: Provider,
    pub model: String,
    pub tier: String,
    pub max_concurrent_override: Option<usize>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Defaults to `<output_path>.checkpoint.jsonl`
    pub checkpoint_path: Option<PathBuf>,
    pub name_column: String,
    pub gender_column: Option<String>,
    /// Write only rows whose key was selected for this run
    pub only_selected: bool,
    /// Caller confirmed a full-dataset run
    pub confirm_all: bool,
    pub max_attempts: u32,
    pub backoff: BackoffSchedule,
}

impl RunConfiguration {
    /// Configuration with library defaults for everything but the paths
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            mode: SelectionMode::Sequential,
            count: 100,
            seed: None,
            provider: Provider::Gemini,
            model: Provider::Gemini.default_model().to_string(),
            tier: "free".to_string(),
            max_concurrent_override: None,
            input_path: input_path.into(),
            output_path: output_path.into(),
            checkpoint_path: None,
            name_column: "Nombre".to_string(),
            gender_column: None,
            only_selected: false,
            confirm_all: false,
            max_attempts: 4,
            backoff: BackoffSchedule::default(),
        }
    }

    /// Check the configuration for consistency
    ///
    /// Returns the resolved rate policy so callers never hold a tier that
    /// was not checked against the provider's table.
    pub fn validate(&self) -> EnrichResult<RatePolicy> {
        match self.mode {
            SelectionMode::All => {
                if !self.confirm_all {
                    return Err(EnrichError::Configuration(
                        "mode 'all' processes every name and can run for hours; confirm with --yes"
                            .to_string(),
                    ));
                }
                if self.count != 0 {
                    warn!(count = self.count, "count is ignored with mode 'all'");
                }
            }
            SelectionMode::Sequential | SelectionMode::Random => {
                if self.count == 0 {
                    return Err(EnrichError::Configuration(format!(
                        "count must be greater than 0 for mode '{}'",
                        self.mode
                    )));
                }
            }
        }

        if self.seed.is_some() && self.mode != SelectionMode::Random {
            warn!(mode = %self.mode, "seed only affects mode 'random'; ignoring");
        }

        if !self.provider.models().contains(&self.model.as_str()) {
            return Err(EnrichError::Configuration(format!(
                "model '{}' is not available for provider {} (expected one of: {})",
                self.model,
                self.provider,
                self.provider.models().join(", ")
            )));
        }

        if self.max_attempts == 0 {
            return Err(EnrichError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if !self.input_path.is_file() {
            return Err(EnrichError::Configuration(format!(
                "input file not found: {}",
                self.input_path.display()
            )));
        }

        if self.name_column.trim().is_empty() {
            return Err(EnrichError::Configuration(
                "name column must not be empty".to_string(),
            ));
        }

        RatePolicy::resolve(self.provider, &self.tier, self.max_concurrent_override)
    }

    /// Checkpoint file used by this run
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_path
            .clone()
            .unwrap_or_else(|| default_checkpoint_path(&self.output_path))
    }
}

/// `<output_path>.checkpoint.jsonl`
pub fn default_checkpoint_path(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_os_string();
    name.push(".checkpoint.jsonl");
    PathBuf::from(name)
}
