//! # NameSeek Common Library
//!
//! Shared code for the NameSeek crates including:
//! - Error types (`Error`, `Result`)
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - Enrichment event types and the broadcast `EventBus`

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
