//! User-facing run summary

use super::merger::MergeKeyConflict;
use crate::error::FailureKind;
use crate::models::NameKey;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// A selected name that ended in permanent failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedName {
    pub key: NameKey,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
    /// Failure recorded by an earlier run and skipped this time
    pub from_checkpoint: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub provider: String,
    pub model: String,
    pub tier: String,
    /// Distinct names selected
    pub selected: usize,
    /// Classified successfully in this run
    pub succeeded: usize,
    /// Failed permanently in this run
    pub failed: usize,
    /// Already in the checkpoint before this run
    pub skipped: usize,
    /// Left unfinished by cancellation
    pub interrupted: usize,
    /// Every failed selected name, including ones from earlier runs
    pub failures: Vec<FailedName>,
    pub conflicts: Vec<MergeKeyConflict>,
    pub rows_written: usize,
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunSummary {
    /// Every selected name has a terminal checkpoint entry
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.interrupted == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_complete() {
            "completed"
        } else {
            "interrupted"
        };
        writeln!(
            f,
            "Enrichment run {} {} in {:.1}s ({} / {} / {})",
            self.run_id,
            status,
            self.elapsed.as_secs_f64(),
            self.provider,
            self.model,
            self.tier
        )?;
        writeln!(f, "  selected:    {}", self.selected)?;
        writeln!(f, "  succeeded:   {}", self.succeeded)?;
        writeln!(f, "  failed:      {}", self.failed)?;
        writeln!(f, "  skipped:     {}", self.skipped)?;
        if self.interrupted > 0 {
            writeln!(
                f,
                "  interrupted: {} (rerun with the same parameters to resume)",
                self.interrupted
            )?;
        }
        writeln!(
            f,
            "  output:      {} ({} rows)",
            self.output_path.display(),
            self.rows_written
        )?;
        writeln!(f, "  checkpoint:  {}", self.checkpoint_path.display())?;

        if !self.failures.is_empty() {
            writeln!(f, "Failed names:")?;
            for failure in &self.failures {
                write!(
                    f,
                    "  {} [{}] after {} attempt(s): {}",
                    failure.key, failure.kind, failure.attempts, failure.message
                )?;
                if failure.from_checkpoint {
                    write!(f, " (earlier run)")?;
                }
                writeln!(f)?;
            }
        }

        if !self.conflicts.is_empty() {
            writeln!(f, "Merge key conflicts:")?;
            for conflict in &self.conflicts {
                writeln!(f, "  {}", conflict)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            run_id: Uuid::nil(),
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash".to_string(),
            tier: "free".to_string(),
            selected: 3,
            succeeded: 1,
            failed: 1,
            skipped: 1,
            interrupted: 0,
            failures: vec![FailedName {
                key: NameKey::ungendered("Wilhelm"),
                kind: FailureKind::AuthError,
                message: "authentication failed: 401".to_string(),
                attempts: 1,
                from_checkpoint: false,
            }],
            conflicts: Vec::new(),
            rows_written: 4,
            output_path: PathBuf::from("out.csv"),
            checkpoint_path: PathBuf::from("out.csv.checkpoint.jsonl"),
            elapsed: Duration::from_millis(1500),
            cancelled: false,
        }
    }

    #[test]
    fn test_display_lists_failures_and_paths() {
        let text = summary().to_string();
        assert!(text.contains("completed"));
        assert!(text.contains("Wilhelm [auth_error]"));
        assert!(text.contains("out.csv.checkpoint.jsonl"));
        assert!(!text.contains("interrupted:"));
    }

    #[test]
    fn test_interrupted_run_is_incomplete() {
        let mut summary = summary();
        summary.cancelled = true;
        summary.interrupted = 2;
        assert!(!summary.is_complete());
        assert!(summary.to_string().contains("interrupted: 2"));
    }
}
