//! MemoryBackend - テスト用のインメモリバックエンド
//!
//! # 実装詳細
//! - Vec<LogRecord> を新しい順（先頭に挿入）で保持
//! - 読み出しは線形スキャン
//! - search は各レコードの JSON 文字列、またはデコード済みの文字列値に対する部分一致

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{JobId, LogRecord, LogType, TaskLogsError, sort_newest_first};
use crate::ports::{Clock, LogReader, LogWriter, SystemClock};

/// Deterministic, dependency-free backend for tests and demos.
///
/// # 使用例
/// ```ignore
/// let backend = MemoryBackend::with_clock(Arc::new(FixedClock::new(at)));
/// backend.write_dequeued(job_id, task_id).await?;
/// assert_eq!(backend.dequeued().await?.len(), 1);
/// ```
pub struct MemoryBackend {
    logs: RwLock<Vec<LogRecord>>,
    clock: Arc<dyn Clock>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            logs: RwLock::new(Vec::new()),
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.logs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.logs.read().await.is_empty()
    }

    async fn collect<F>(&self, predicate: F) -> Vec<LogRecord>
    where
        F: Fn(&LogRecord) -> bool,
    {
        let logs = self.logs.read().await;
        let mut found: Vec<LogRecord> = logs.iter().filter(|r| predicate(r)).cloned().collect();
        sort_newest_first(&mut found);
        found
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogWriter for MemoryBackend {
    async fn write(&self, record: LogRecord) -> Result<(), TaskLogsError> {
        tracing::debug!(job_id = %record.job_id, log_type = %record.log_type(), "memory write");
        self.logs.write().await.insert(0, record);
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[async_trait]
impl LogReader for MemoryBackend {
    async fn logs_by_type(
        &self,
        log_type: Option<LogType>,
    ) -> Result<Vec<LogRecord>, TaskLogsError> {
        Ok(self
            .collect(|r| log_type.is_none_or(|t| r.log_type() == t))
            .await)
    }

    async fn find_job(&self, job_id: &JobId) -> Result<Vec<LogRecord>, TaskLogsError> {
        Ok(self.collect(|r| &r.job_id == job_id).await)
    }

    async fn search(&self, query: &str) -> Result<Vec<LogRecord>, TaskLogsError> {
        Ok(self
            .collect(|r| {
                serde_json::to_string(r).is_ok_and(|text| text.contains(query))
                    || r.mentions(query)
            })
            .await)
    }
}
