//! Log records: one lifecycle event of one job.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::TaskLogsError;
use super::ids::{JobId, TaskId};
use super::job::JobDetails;

/// Discriminant of a [`LogRecord`], stored as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Enqueued,
    Dequeued,
    Completed,
    Exception,
    Failed,
}

impl LogType {
    pub const ALL: [LogType; 5] = [
        LogType::Enqueued,
        LogType::Dequeued,
        LogType::Completed,
        LogType::Exception,
        LogType::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogType::Enqueued => "enqueued",
            LogType::Dequeued => "dequeued",
            LogType::Completed => "completed",
            LogType::Exception => "exception",
            LogType::Failed => "failed",
        }
    }

    /// `completed`, `exception` and `failed` end a job's processing attempt.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LogType::Completed | LogType::Exception | LogType::Failed
        )
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogType {
    type Err = TaskLogsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TaskLogsError::UnknownLogType(s.to_string()))
    }
}

/// Variant-specific payload of a record, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogEvent {
    Enqueued {
        job: JobDetails,
    },
    Dequeued,
    Completed {
        #[serde(default)]
        result: Value,
    },
    Exception {
        exception: String,
    },
    Failed,
}

impl LogEvent {
    pub fn log_type(&self) -> LogType {
        match self {
            LogEvent::Enqueued { .. } => LogType::Enqueued,
            LogEvent::Dequeued => LogType::Dequeued,
            LogEvent::Completed { .. } => LogType::Completed,
            LogEvent::Exception { .. } => LogType::Exception,
            LogEvent::Failed => LogType::Failed,
        }
    }
}

/// One lifecycle event for a job.
///
/// Identity is (job_id, type, timestamp); there is no separate key.
/// Records are created once and never mutated by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub job_id: JobId,
    pub task_id: TaskId,
    #[serde(flatten)]
    pub event: LogEvent,
}

impl LogRecord {
    pub fn new(job_id: JobId, task_id: TaskId, timestamp: DateTime<Utc>, event: LogEvent) -> Self {
        Self {
            timestamp,
            job_id,
            task_id,
            event,
        }
    }

    pub fn enqueued(
        job_id: JobId,
        task_id: TaskId,
        timestamp: DateTime<Utc>,
        job: JobDetails,
    ) -> Self {
        Self::new(job_id, task_id, timestamp, LogEvent::Enqueued { job })
    }

    pub fn dequeued(job_id: JobId, task_id: TaskId, timestamp: DateTime<Utc>) -> Self {
        Self::new(job_id, task_id, timestamp, LogEvent::Dequeued)
    }

    pub fn completed(
        job_id: JobId,
        task_id: TaskId,
        timestamp: DateTime<Utc>,
        result: Value,
    ) -> Self {
        Self::new(job_id, task_id, timestamp, LogEvent::Completed { result })
    }

    pub fn exception(
        job_id: JobId,
        task_id: TaskId,
        timestamp: DateTime<Utc>,
        exception: impl Into<String>,
    ) -> Self {
        Self::new(
            job_id,
            task_id,
            timestamp,
            LogEvent::Exception {
                exception: exception.into(),
            },
        )
    }

    pub fn failed(job_id: JobId, task_id: TaskId, timestamp: DateTime<Utc>) -> Self {
        Self::new(job_id, task_id, timestamp, LogEvent::Failed)
    }

    pub fn log_type(&self) -> LogType {
        self.event.log_type()
    }

    pub fn job(&self) -> Option<&JobDetails> {
        match &self.event {
            LogEvent::Enqueued { job } => Some(job),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.event {
            LogEvent::Completed { result } => Some(result),
            _ => None,
        }
    }

    pub fn exception_text(&self) -> Option<&str> {
        match &self.event {
            LogEvent::Exception { exception } => Some(exception),
            _ => None,
        }
    }

    /// Whether any decoded string in the record (key or value, however
    /// deeply nested) contains `query`.
    pub fn mentions(&self, query: &str) -> bool {
        serde_json::to_value(self).is_ok_and(|value| value_mentions(&value, query))
    }
}

fn value_mentions(value: &Value, query: &str) -> bool {
    match value {
        Value::String(s) => s.contains(query),
        Value::Array(items) => items.iter().any(|item| value_mentions(item, query)),
        Value::Object(map) => map
            .iter()
            .any(|(key, item)| key.contains(query) || value_mentions(item, query)),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Sorts records newest first. The sort is stable, so records sharing a
/// timestamp keep their incoming order.
pub fn sort_newest_first(records: &mut [LogRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}
