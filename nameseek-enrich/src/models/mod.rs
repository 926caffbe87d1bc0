//! Data model for enrichment runs

pub mod classification;
pub mod name_record;
pub mod run_config;
pub mod task;

pub use classification::{ClassificationResult, Difficulty, OriginCategory, RawClassification};
pub use name_record::{Gender, NameKey, NameRecord};
pub use run_config::{Provider, RunConfiguration, SelectionMode};
pub use task::{
    ClassificationTask, TaskFailure, TaskOutcome, TaskReport, TaskState, TerminalOutcome,
};
