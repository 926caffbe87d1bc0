//! Result merger
//!
//! Joins terminal outcomes onto the base table by `(name, gender)`. The
//! join is total: every base row appears exactly once, in base order, and
//! every enrichment cell holds either a value or an explicit marker.

use super::checkpoint::CheckpointEntry;
use super::registry::EnrichmentRegistry;
use crate::dataset::BaseDataset;
use crate::models::{NameKey, TerminalOutcome};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::warn;

/// Cell marker for rows whose key was never classified
pub const NOT_PROCESSED: &str = "not_processed";
/// Cell marker for rows whose key failed permanently
pub const FAILED: &str = "failed";
/// Cell marker for rows whose key has conflicting results
pub const KEY_CONFLICT: &str = "key_conflict";
/// Cell marker for rows without a usable name
pub const INVALID_KEY: &str = "invalid_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// More than one distinct outcome for the same key
    AmbiguousResult,
    /// Blank name cell
    EmptyKey,
}

/// Join key that could not be resolved; its rows are flagged, not dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeKeyConflict {
    pub key: NameKey,
    /// Base row indices carrying the key
    pub rows: Vec<usize>,
    pub reason: ConflictReason,
}

impl fmt::Display for MergeKeyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<String> = self.rows.iter().map(|r| r.to_string()).collect();
        match self.reason {
            ConflictReason::AmbiguousResult => write!(
                f,
                "'{}' has conflicting results (rows {})",
                self.key,
                rows.join(", ")
            ),
            ConflictReason::EmptyKey => write!(f, "blank name (rows {})", rows.join(", ")),
        }
    }
}

/// Merged table plus the key of every row
#[derive(Debug, Clone)]
pub struct MergedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_keys: Vec<NameKey>,
    pub conflicts: Vec<MergeKeyConflict>,
}

impl MergedTable {
    /// Keep only rows whose key is in `keys`
    pub fn retain_keys(&mut self, keys: &HashSet<NameKey>) {
        let mut kept_rows = Vec::new();
        let mut kept_keys = Vec::new();
        for (row, key) in self.rows.drain(..).zip(self.row_keys.drain(..)) {
            if keys.contains(&key) {
                kept_rows.push(row);
                kept_keys.push(key);
            }
        }
        self.rows = kept_rows;
        self.row_keys = kept_keys;
    }
}

enum Resolved<'a> {
    Outcome(&'a TerminalOutcome),
    Conflict,
}

/// Join `entries` onto `base`
///
/// Registry columns already present in the base headers are overwritten in
/// place; the rest are appended.
pub fn merge(
    base: &BaseDataset,
    entries: &[CheckpointEntry],
    registry: &EnrichmentRegistry,
) -> MergedTable {
    let mut resolved: HashMap<NameKey, Resolved<'_>> = HashMap::with_capacity(entries.len());
    for entry in entries {
        let key = entry.key();
        let next = match resolved.get(&key) {
            None => Resolved::Outcome(&entry.outcome),
            Some(Resolved::Outcome(existing)) if **existing == entry.outcome => continue,
            Some(_) => Resolved::Conflict,
        };
        resolved.insert(key, next);
    }

    let mut headers = base.headers.clone();
    let targets: Vec<usize> = registry
        .columns()
        .into_iter()
        .map(|column| match headers.iter().position(|h| h == column) {
            Some(idx) => idx,
            None => {
                headers.push(column.to_string());
                headers.len() - 1
            }
        })
        .collect();

    let width = headers.len();
    let mut rows = Vec::with_capacity(base.len());
    let mut row_keys = Vec::with_capacity(base.len());
    let mut conflict_rows: HashMap<NameKey, (ConflictReason, Vec<usize>)> = HashMap::new();

    for (row_idx, cells) in base.rows.iter().enumerate() {
        let key = base.key_at(row_idx);
        let mut row = cells.clone();
        row.resize(width, String::new());

        let values: Vec<String> = if key.is_blank() {
            conflict_rows
                .entry(key.clone())
                .or_insert_with(|| (ConflictReason::EmptyKey, Vec::new()))
                .1
                .push(row_idx);
            vec![INVALID_KEY.to_string(); targets.len()]
        } else {
            match resolved.get(&key) {
                Some(Resolved::Outcome(TerminalOutcome::Succeeded { result })) => {
                    registry.values(result)
                }
                Some(Resolved::Outcome(TerminalOutcome::Failed { .. })) => {
                    vec![FAILED.to_string(); targets.len()]
                }
                Some(Resolved::Conflict) => {
                    conflict_rows
                        .entry(key.clone())
                        .or_insert_with(|| (ConflictReason::AmbiguousResult, Vec::new()))
                        .1
                        .push(row_idx);
                    vec![KEY_CONFLICT.to_string(); targets.len()]
                }
                None => vec![NOT_PROCESSED.to_string(); targets.len()],
            }
        };

        for (target, value) in targets.iter().zip(values) {
            row[*target] = value;
        }
        rows.push(row);
        row_keys.push(key);
    }

    let mut conflicts: Vec<MergeKeyConflict> = conflict_rows
        .into_iter()
        .map(|(key, (reason, rows))| MergeKeyConflict { key, rows, reason })
        .collect();
    conflicts.sort_by_key(|conflict| conflict.rows.first().copied());

    for conflict in &conflicts {
        warn!(conflict = %conflict, "Merge key conflict, rows flagged");
    }

    MergedTable {
        headers,
        rows,
        row_keys,
        conflicts,
    }
}
