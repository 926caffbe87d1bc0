//! nameseek-enrich library interface
//!
//! Bulk enrichment of a first-name dataset through an AI classification
//! provider: selection, rate-limited dispatch with retries, durable
//! checkpointing and a total merge back onto the base dataset.
//!
//! The binary in `main.rs` is a thin driver over [`EnrichmentRun`];
//! integration tests use the same entry point with a scripted adapter.

pub mod config;
pub mod dataset;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;

pub use crate::error::{EnrichError, EnrichResult, FailureClass, FailureKind, ProviderError};
pub use crate::orchestrator::registry::EnrichmentRegistry;
pub use crate::orchestrator::summary::RunSummary;
pub use crate::orchestrator::{EnrichmentRun, RunContext};
pub use crate::services::ProviderAdapter;
