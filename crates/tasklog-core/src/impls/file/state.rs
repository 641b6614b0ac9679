//! Current-state index derived from the append log.
//!
//! Replaying the log keeps only the latest record of each job. A job that
//! moves from `enqueued` to `completed` leaves the `enqueued` bucket, so
//! every job id sits in exactly one bucket after a replay.

use std::collections::HashMap;

use crate::domain::{JobId, LogRecord, LogType};

#[derive(Debug, Clone, Default)]
pub struct CurrentState {
    latest: HashMap<JobId, LogRecord>,
}

impl CurrentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index by replaying records in write order.
    pub fn rebuild<I>(records: I) -> Self
    where
        I: IntoIterator<Item = LogRecord>,
    {
        let mut state = Self::new();
        for record in records {
            state.apply(record);
        }
        state
    }

    /// Move the record's job into the bucket of the record's type.
    pub fn apply(&mut self, record: LogRecord) {
        self.latest.insert(record.job_id.clone(), record);
    }

    /// Type of the last event seen for a job.
    pub fn state_of(&self, job_id: &JobId) -> Option<LogType> {
        self.latest.get(job_id).map(LogRecord::log_type)
    }

    pub fn latest(&self, job_id: &JobId) -> Option<&LogRecord> {
        self.latest.get(job_id)
    }

    /// Jobs whose current state is `log_type`, oldest first.
    pub fn jobs_in(&self, log_type: LogType) -> Vec<&LogRecord> {
        let mut bucket: Vec<&LogRecord> = self
            .latest
            .values()
            .filter(|r| r.log_type() == log_type)
            .collect();
        bucket.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        bucket
    }

    /// Jobs whose latest record does not end an attempt, oldest first.
    pub fn in_flight(&self) -> Vec<&LogRecord> {
        let mut jobs: Vec<&LogRecord> = self
            .latest
            .values()
            .filter(|r| !r.log_type().is_terminal())
            .collect();
        jobs.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        jobs
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}
