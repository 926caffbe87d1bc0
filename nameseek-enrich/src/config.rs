//! Configuration resolution for nameseek-enrich
//!
//! Builds a [`RunConfiguration`] from command-line arguments and the TOML
//! bootstrap config. Priority is CLI → ENV → TOML → compiled default; the
//! environment only matters for the API keys and the config file path.

use crate::error::{EnrichError, EnrichResult};
use crate::models::{Provider, RunConfiguration, SelectionMode};
use crate::orchestrator::retry::BackoffSchedule;
use clap::Parser;
use nameseek_common::config::{self, TomlConfig, GEMINI_KEY_ENV_VAR, OPENAI_KEY_ENV_VAR};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for nameseek-enrich
#[derive(Parser, Debug, Clone)]
#[command(name = "nameseek-enrich")]
#[command(about = "Bulk AI enrichment of a first-name dataset")]
#[command(version)]
pub struct CliArgs {
    /// Base dataset (CSV with a header row)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Enriched output file (CSV)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Selection mode: sequential, random or all
    #[arg(long, default_value = "sequential")]
    pub mode: SelectionMode,

    /// Number of distinct names to process [default: 100; ignored with mode all]
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Seed for mode random
    #[arg(long)]
    pub seed: Option<u64>,

    /// AI provider: gemini or openai
    #[arg(short, long, default_value = "gemini", env = "NAMESEEK_PROVIDER")]
    pub provider: Provider,

    /// Model name (defaults to the provider's default model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Provider rate tier
    #[arg(long, default_value = "free")]
    pub tier: String,

    /// Override the tier's concurrency limit
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Checkpoint file (defaults to <output>.checkpoint.jsonl)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Column holding the first name
    #[arg(long, default_value = "Nombre")]
    pub name_column: String,

    /// Column holding the gender (auto-detected when omitted)
    #[arg(long)]
    pub gender_column: Option<String>,

    /// Write only rows whose name was selected for this run
    #[arg(long)]
    pub only_selected: bool,

    /// Confirm a full-dataset run (mode all)
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Build the run configuration from CLI arguments and TOML settings
///
/// Only assembles values; [`RunConfiguration::validate`] checks them.
pub fn build_run_configuration(args: &CliArgs, toml: &TomlConfig) -> RunConfiguration {
    let mut config = RunConfiguration::new(&args.input, &args.output);
    config.mode = args.mode;
    match (args.count, args.mode) {
        (Some(count), _) => config.count = count,
        // Zero keeps validation from warning about a count nobody passed
        (None, SelectionMode::All) => config.count = 0,
        (None, _) => {}
    }
    config.seed = args.seed;
    config.provider = args.provider;
    config.model = args
        .model
        .clone()
        .unwrap_or_else(|| args.provider.default_model().to_string());
    config.tier = args.tier.clone();
    config.max_concurrent_override = args.max_concurrent;
    config.checkpoint_path = args.checkpoint.clone();
    config.name_column = args.name_column.clone();
    config.gender_column = args.gender_column.clone();
    config.only_selected = args.only_selected;
    config.confirm_all = args.yes;
    config.max_attempts = toml.enrich.max_attempts;
    config.backoff = BackoffSchedule::new(
        Duration::from_millis(toml.enrich.backoff_base_ms),
        Duration::from_millis(toml.enrich.backoff_max_ms),
    );
    config
}

/// Resolve the API key for `provider`
///
/// **Priority:** ENV → TOML
pub fn resolve_provider_key(provider: Provider, toml: &TomlConfig) -> EnrichResult<String> {
    let (env_var, toml_value) = match provider {
        Provider::Gemini => (GEMINI_KEY_ENV_VAR, toml.providers.gemini_api_key.as_deref()),
        Provider::OpenAi => (OPENAI_KEY_ENV_VAR, toml.providers.openai_api_key.as_deref()),
    };

    config::resolve_api_key(env_var, toml_value).ok_or_else(|| {
        EnrichError::Configuration(format!(
            "{} API key not configured. Set {} or add {}_api_key under [providers] in the TOML config",
            provider,
            env_var,
            provider.as_str()
        ))
    })
}
