//! Append-only JSON Lines checkpoint
//!
//! One line per terminal task outcome. The file is read at startup to
//! compute the remaining work and at the end to assemble output; it is
//! never rewritten or truncated.
//!
//! `append` returns only after the line has been handed to the OS and
//! `sync_data` has completed. A line left torn by a killed process is
//! skipped on load, and the next append starts on a fresh line so it
//! cannot glue onto the fragment.

use crate::error::{EnrichError, EnrichResult};
use crate::models::{Gender, NameKey, TerminalOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One terminal outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Run that produced the entry
    pub run_id: Uuid,
    pub name: String,
    pub gender: Gender,
    /// Adapter calls made, first call included
    pub attempts: u32,
    pub outcome: TerminalOutcome,
    pub timestamp: DateTime<Utc>,
}

impl CheckpointEntry {
    pub fn new(run_id: Uuid, key: &NameKey, attempts: u32, outcome: TerminalOutcome) -> Self {
        Self {
            run_id,
            name: key.name.clone(),
            gender: key.gender,
            attempts,
            outcome,
            timestamp: Utc::now(),
        }
    }

    pub fn key(&self) -> NameKey {
        NameKey::new(&self.name, self.gender)
    }
}

struct Writer {
    file: File,
    /// File does not end in '\n' (torn last line or failed write)
    needs_newline: bool,
}

pub struct CheckpointStore {
    path: PathBuf,
    index: RwLock<HashSet<NameKey>>,
    writer: Mutex<Writer>,
}

impl CheckpointStore {
    /// Open (or create) the checkpoint at `path` and index existing entries
    pub async fn open(path: impl AsRef<Path>) -> EnrichResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    EnrichError::Checkpoint(format!(
                        "cannot create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let (entries, needs_newline) = match read_to_recorded_len(&path).await {
            Ok(bytes) => {
                let needs_newline = bytes.last().is_some_and(|b| *b != b'\n');
                (parse_entries(&bytes, &path), needs_newline)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => (Vec::new(), false),
            Err(e) => {
                return Err(EnrichError::Checkpoint(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut index = HashSet::with_capacity(entries.len());
        for entry in &entries {
            index.insert(entry.key());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                EnrichError::Checkpoint(format!("cannot open {}: {}", path.display(), e))
            })?;

        info!(
            path = %path.display(),
            entries = index.len(),
            "Checkpoint opened"
        );

        Ok(Self {
            path,
            index: RwLock::new(index),
            writer: Mutex::new(Writer {
                file,
                needs_newline,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `key` already has a terminal entry
    pub async fn has(&self, key: &NameKey) -> bool {
        self.index.read().await.contains(key)
    }

    /// Number of keys with a terminal entry
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    /// Durably append one entry
    ///
    /// A key can be appended at most once per checkpoint file. Any IO
    /// failure is a `CheckpointWrite` error and must abort the run.
    pub async fn append(&self, entry: &CheckpointEntry) -> EnrichResult<()> {
        let key = entry.key();
        let write_error = |source: io::Error| EnrichError::CheckpointWrite {
            key: key.to_string(),
            source,
        };

        let mut line = serde_json::to_string(entry)
            .map_err(|e| write_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        line.push('\n');

        let mut writer = self.writer.lock().await;

        if self.index.read().await.contains(&key) {
            return Err(EnrichError::Checkpoint(format!(
                "duplicate checkpoint entry for '{}'",
                key
            )));
        }

        if writer.needs_newline {
            line.insert(0, '\n');
        }

        let written = async {
            writer.file.write_all(line.as_bytes()).await?;
            writer.file.flush().await?;
            writer.file.sync_data().await
        }
        .await;

        if let Err(e) = written {
            writer.needs_newline = true;
            return Err(write_error(e));
        }
        writer.needs_newline = false;

        self.index.write().await.insert(key);
        debug!(name = %entry.key(), attempts = entry.attempts, "Checkpoint entry appended");
        Ok(())
    }

    /// Every valid entry currently in the file, first entry per key
    pub async fn all_entries(&self) -> EnrichResult<Vec<CheckpointEntry>> {
        // Serialize with appends so a half-written line is never observed
        let _writer = self.writer.lock().await;
        let bytes = read_to_recorded_len(&self.path).await.map_err(|e| {
            EnrichError::Checkpoint(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        Ok(parse_entries(&bytes, &self.path))
    }
}

/// Read the file up to the length its metadata reports
///
/// Devices and pipes report zero and read as empty.
async fn read_to_recorded_len(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path).await?;
    let len = file.metadata().await?.len();
    let mut bytes = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut bytes).await?;
    Ok(bytes)
}

fn parse_entries(bytes: &[u8], path: &Path) -> Vec<CheckpointEntry> {
    let content = String::from_utf8_lossy(bytes);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<CheckpointEntry>(line) {
            Ok(entry) => {
                if seen.insert(entry.key()) {
                    entries.push(entry);
                } else {
                    warn!(
                        path = %path.display(),
                        line = idx + 1,
                        name = %entry.key(),
                        "Duplicate checkpoint entry ignored"
                    );
                }
            }
            Err(e) => warn!(
                path = %path.display(),
                line = idx + 1,
                error = %e,
                "Skipping unreadable checkpoint line"
            ),
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::models::TaskFailure;
    use tempfile::TempDir;

    fn failed_entry(name: &str) -> CheckpointEntry {
        CheckpointEntry::new(
            Uuid::new_v4(),
            &NameKey::ungendered(name),
            3,
            TerminalOutcome::failed(TaskFailure {
                kind: FailureKind::Timeout,
                message: "request timed out".to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_append_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.checkpoint.jsonl");

        {
            let store = CheckpointStore::open(&path).await.unwrap();
            assert!(store.is_empty().await);
            store.append(&failed_entry("Ana")).await.unwrap();
            store.append(&failed_entry("Luis")).await.unwrap();
        }

        let store = CheckpointStore::open(&path).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert!(store.has(&NameKey::ungendered("Ana")).await);
        assert!(!store.has(&NameKey::ungendered("Eva")).await);
    }

    #[tokio::test]
    async fn test_duplicate_append_rejected() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::open(dir.path().join("c.jsonl")).await.unwrap();

        store.append(&failed_entry("Ana")).await.unwrap();
        let err = store.append(&failed_entry("Ana")).await.unwrap_err();
        assert!(matches!(err, EnrichError::Checkpoint(_)));
        assert_eq!(store.all_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_torn_line_skipped_and_not_glued() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.jsonl");

        let good = serde_json::to_string(&failed_entry("Ana")).unwrap();
        std::fs::write(&path, format!("{}\n{{\"run_id\":\"abc\",\"na", good)).unwrap();

        let store = CheckpointStore::open(&path).await.unwrap();
        assert_eq!(store.len().await, 1);

        store.append(&failed_entry("Luis")).await.unwrap();

        let reopened = CheckpointStore::open(&path).await.unwrap();
        let names: Vec<String> = reopened
            .all_entries()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, vec!["Ana".to_string(), "Luis".to_string()]);
    }

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/c.jsonl");
        let store = CheckpointStore::open(&path).await.unwrap();
        store.append(&failed_entry("Ana")).await.unwrap();
        assert!(path.exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_write_failure_is_checkpoint_write_error() {
        let store = CheckpointStore::open("/dev/full").await.unwrap();
        assert!(store.is_empty().await);

        let err = store.append(&failed_entry("Ana")).await.unwrap_err();
        assert!(matches!(err, EnrichError::CheckpointWrite { ref key, .. } if key == "Ana"));
        assert!(!store.has(&NameKey::ungendered("Ana")).await);
    }
}
