//! Backend ports - ログの書き込み / 読み出しインターフェース
//!
//! バックエンドは `LogWriter` と `LogReader` のどちらか、または両方を実装します。
//! 呼び出し側は trait object（`Arc<dyn LogWriter>` / `Arc<dyn LogBackend>`）にだけ依存します。
//!
//! # 設計原則
//! - 書き込みは 1 呼び出しにつき 1 レコード、リトライなし
//! - 読み出しは副作用なし、0 件でもエラーにしない（空の Vec を返す）
//! - 結果は常に新しい順（timestamp 降順）

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{JobDetails, JobId, LogRecord, LogType, TaskId, TaskLogsError};

/// Write side of a backend.
///
/// Only `write` is required; the `write_*` helpers build the matching
/// record stamped with [`LogWriter::now`].
#[async_trait]
pub trait LogWriter: Send + Sync {
    /// Persist exactly one record.
    async fn write(&self, record: LogRecord) -> Result<(), TaskLogsError>;

    /// Timestamp source for the `write_*` helpers.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn write_enqueued(
        &self,
        job_id: JobId,
        task_id: TaskId,
        job: JobDetails,
    ) -> Result<(), TaskLogsError> {
        let record = LogRecord::enqueued(job_id, task_id, self.now(), job);
        self.write(record).await
    }

    async fn write_dequeued(&self, job_id: JobId, task_id: TaskId) -> Result<(), TaskLogsError> {
        let record = LogRecord::dequeued(job_id, task_id, self.now());
        self.write(record).await
    }

    async fn write_completed(
        &self,
        job_id: JobId,
        task_id: TaskId,
        result: Value,
    ) -> Result<(), TaskLogsError> {
        let record = LogRecord::completed(job_id, task_id, self.now(), result);
        self.write(record).await
    }

    async fn write_exception(
        &self,
        job_id: JobId,
        task_id: TaskId,
        exception: String,
    ) -> Result<(), TaskLogsError> {
        let record = LogRecord::exception(job_id, task_id, self.now(), exception);
        self.write(record).await
    }

    async fn write_failed(&self, job_id: JobId, task_id: TaskId) -> Result<(), TaskLogsError> {
        let record = LogRecord::failed(job_id, task_id, self.now());
        self.write(record).await
    }
}

/// Read side of a backend.
#[async_trait]
pub trait LogReader: Send + Sync {
    /// Records of one type, or every record for `None`; newest first.
    async fn logs_by_type(&self, log_type: Option<LogType>)
    -> Result<Vec<LogRecord>, TaskLogsError>;

    /// Every record of one job; newest first.
    async fn find_job(&self, job_id: &JobId) -> Result<Vec<LogRecord>, TaskLogsError>;

    /// Backend-specific free-text query; newest first.
    async fn search(&self, query: &str) -> Result<Vec<LogRecord>, TaskLogsError>;

    /// Distinct task ids that have at least one record, sorted by name.
    async fn list_tasks(&self) -> Result<Vec<TaskId>, TaskLogsError> {
        let tasks: BTreeSet<TaskId> = self
            .all()
            .await?
            .into_iter()
            .map(|record| record.task_id)
            .collect();
        Ok(tasks.into_iter().collect())
    }

    async fn enqueued(&self) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.logs_by_type(Some(LogType::Enqueued)).await
    }

    async fn dequeued(&self) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.logs_by_type(Some(LogType::Dequeued)).await
    }

    async fn completed(&self) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.logs_by_type(Some(LogType::Completed)).await
    }

    async fn exception(&self) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.logs_by_type(Some(LogType::Exception)).await
    }

    async fn failed(&self) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.logs_by_type(Some(LogType::Failed)).await
    }

    async fn all(&self) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.logs_by_type(None).await
    }
}

/// A backend that can both write and read records.
pub trait LogBackend: LogWriter + LogReader {}

impl<T: LogWriter + LogReader + ?Sized> LogBackend for T {}
