//! FileBackend - ファイルベースのバックエンド
//!
//! # 構成
//! - `log`: 追記専用の JSON Lines ログ（書き込み経路はここだけ）
//! - `state`: ログを再生して作る「ジョブごとの現在状態」インデックス
//!
//! 読み出しのたびにファイル全体を先頭から再生します。

mod log;
mod state;

pub use self::log::AppendLog;
pub use self::state::CurrentState;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::domain::{JobId, LogRecord, LogType, TaskLogsError, sort_newest_first};
use crate::ports::{Clock, LogReader, LogWriter, SystemClock};

/// Flat-file backend: newline-delimited JSON records.
///
/// Not safe for concurrent writers in different processes.
pub struct FileBackend {
    log: AppendLog,
    clock: Arc<dyn Clock>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            log: AppendLog::new(path),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        self.log.path()
    }

    /// Rebuild the current-state index from the full log.
    pub async fn current_state(&self) -> Result<CurrentState, TaskLogsError> {
        Ok(CurrentState::rebuild(self.log.replay().await?))
    }

    /// Replay the log (oldest first), keep matching records, return newest first.
    async fn collect<F>(&self, predicate: F) -> Result<Vec<LogRecord>, TaskLogsError>
    where
        F: Fn(&LogRecord) -> bool,
    {
        let mut found: Vec<LogRecord> = self
            .log
            .replay()
            .await?
            .into_iter()
            .rev()
            .filter(|r| predicate(r))
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }
}

#[async_trait]
impl LogWriter for FileBackend {
    #[instrument(skip_all, err, fields(job_id = %record.job_id, log_type = %record.log_type()))]
    async fn write(&self, record: LogRecord) -> Result<(), TaskLogsError> {
        self.log.append(&record).await
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[async_trait]
impl LogReader for FileBackend {
    async fn logs_by_type(
        &self,
        log_type: Option<LogType>,
    ) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.collect(|r| log_type.is_none_or(|t| r.log_type() == t))
            .await
    }

    async fn find_job(&self, job_id: &JobId) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.collect(|r| &r.job_id == job_id).await
    }

    /// Substring match against the stored JSON lines or the decoded text
    /// inside them.
    async fn search(&self, query: &str) -> Result<Vec<LogRecord>, TaskLogsError> {
        let mut found: Vec<LogRecord> = self
            .log
            .entries()
            .await?
            .into_iter()
            .rev()
            .filter(|entry| entry.raw.contains(query) || entry.record.mentions(query))
            .map(|entry| entry.record)
            .collect();
        sort_newest_first(&mut found);
        Ok(found)
    }
}
