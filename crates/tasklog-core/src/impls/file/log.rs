//! Append-only newline-delimited JSON log.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::domain::{LogRecord, TaskLogsError};

/// One stored line and the record decoded from it.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub raw: String,
    pub record: LogRecord,
}

/// The immutable event log: records are only ever appended.
#[derive(Debug, Clone)]
pub struct AppendLog {
    path: PathBuf,
}

impl AppendLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    ///
    /// The line is written with one `write_all` on an append-mode handle;
    /// no lock is taken.
    pub async fn append(&self, record: &LogRecord) -> Result<(), TaskLogsError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Replay every record from the beginning, in write order.
    pub async fn replay(&self) -> Result<Vec<LogRecord>, TaskLogsError> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .map(|entry| entry.record)
            .collect())
    }

    pub(crate) async fn entries(&self) -> Result<Vec<Entry>, TaskLogsError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            // まだ何も書かれていないログは空として扱う
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|source| {
                TaskLogsError::MalformedRecord {
                    line: index + 1,
                    source,
                }
            })?;
            entries.push(Entry {
                raw: line.to_string(),
                record,
            });
        }
        Ok(entries)
    }
}
