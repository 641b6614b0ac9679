//! Per-type record counts for status views.

use serde::{Deserialize, Serialize};

use crate::domain::{LogRecord, LogType, TaskLogsError};
use crate::ports::LogReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCounts {
    pub enqueued: usize,
    pub dequeued: usize,
    pub completed: usize,
    pub exception: usize,
    pub failed: usize,
}

impl LogCounts {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        let mut counts = Self::default();
        for record in records {
            *counts.slot(record.log_type()) += 1;
        }
        counts
    }

    /// Count everything a reader holds.
    pub async fn collect<R: LogReader + ?Sized>(reader: &R) -> Result<Self, TaskLogsError> {
        Ok(Self::from_records(&reader.all().await?))
    }

    pub fn get(&self, log_type: LogType) -> usize {
        match log_type {
            LogType::Enqueued => self.enqueued,
            LogType::Dequeued => self.dequeued,
            LogType::Completed => self.completed,
            LogType::Exception => self.exception,
            LogType::Failed => self.failed,
        }
    }

    pub fn total(&self) -> usize {
        LogType::ALL.into_iter().map(|t| self.get(t)).sum()
    }

    fn slot(&mut self, log_type: LogType) -> &mut usize {
        match log_type {
            LogType::Enqueued => &mut self.enqueued,
            LogType::Dequeued => &mut self.dequeued,
            LogType::Completed => &mut self.completed,
            LogType::Exception => &mut self.exception,
            LogType::Failed => &mut self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobId, TaskId};
    use chrono::Utc;

    #[test]
    fn counts_each_type() {
        let now = Utc::now();
        let t = || TaskId::new("t");
        let records = [
            LogRecord::dequeued(JobId::new("a"), t(), now),
            LogRecord::dequeued(JobId::new("b"), t(), now),
            LogRecord::exception(JobId::new("b"), t(), now, "boom"),
            LogRecord::failed(JobId::new("b"), t(), now),
        ];

        let counts = LogCounts::from_records(&records);
        assert_eq!(counts.dequeued, 2);
        assert_eq!(counts.exception, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.get(LogType::Completed), 0);
        assert_eq!(counts.total(), records.len());
    }
}
