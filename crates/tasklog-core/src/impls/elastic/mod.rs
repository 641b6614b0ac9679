//! ElasticsearchBackend - 検索エンジンを使った本番用バックエンド
//!
//! # 設計原則
//! - 接続時に index template を一度だけ登録する
//! - レコードは timestamp から決まる期間インデックス（既定: 1 日 1 インデックス）に書く
//! - 読み出しは `task-logs-*` 全体に対して timestamp 降順
//! - 通信・クエリエラーはそのまま返す（リトライなし）

pub mod mapping;
pub mod query;

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::instrument;

use self::mapping::{DEFAULT_INDEX_POSTFIX, INDEX_PREFIX, TEMPLATE_NAME, task_logs_template};
use crate::domain::{JobId, LogRecord, LogType, TaskId, TaskLogsError};
use crate::ports::{Clock, LogReader, LogWriter, SystemClock};

/// Connection and indexing options.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,

    /// strftime pattern appended to [`INDEX_PREFIX`] to pick the period index.
    pub index_postfix: String,

    /// Ask the engine to refresh after each write so reads see it at once.
    pub force_refresh: bool,

    /// Upper bound on hits returned by one read.
    pub max_results: usize,

    pub timeout: Duration,
}

impl ElasticConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index_postfix: DEFAULT_INDEX_POSTFIX.to_string(),
            force_refresh: false,
            max_results: 10_000,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }
}

pub struct ElasticsearchBackend {
    client: reqwest::Client,
    base_url: String,
    config: ElasticConfig,
    clock: Arc<dyn Clock>,
}

impl ElasticsearchBackend {
    /// Build the client and register the index template.
    pub async fn connect(config: ElasticConfig) -> Result<Self, TaskLogsError> {
        Self::connect_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(
        config: ElasticConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TaskLogsError> {
        if StrftimeItems::new(&config.index_postfix).any(|item| matches!(item, Item::Error)) {
            return Err(TaskLogsError::Config(format!(
                "invalid index_postfix: {}",
                config.index_postfix
            )));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let backend = Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
            clock,
        };
        backend.put_template().await?;
        Ok(backend)
    }

    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    /// Period index a record with this timestamp is written to.
    pub fn index_for(&self, timestamp: DateTime<Utc>) -> Result<String, TaskLogsError> {
        let mut index = INDEX_PREFIX.to_string();
        write!(index, "{}", timestamp.format(&self.config.index_postfix)).map_err(|_| {
            TaskLogsError::Config(format!(
                "invalid index_postfix: {}",
                self.config.index_postfix
            ))
        })?;
        Ok(index)
    }

    #[instrument(skip_all, err)]
    async fn put_template(&self) -> Result<(), TaskLogsError> {
        let url = format!("{}/_template/{TEMPLATE_NAME}", self.base_url);
        let response = self
            .client
            .put(url)
            .json(&task_logs_template())
            .send()
            .await?;
        read_json(response).await?;
        tracing::info!(template = TEMPLATE_NAME, "index template registered");
        Ok(())
    }

    async fn search_all(&self, body: Value) -> Result<Value, TaskLogsError> {
        let url = format!("{}/{INDEX_PREFIX}*/_search", self.base_url);
        let response = self.client.post(url).json(&body).send().await?;
        read_json(response).await
    }

    async fn query(&self, query: Value) -> Result<Vec<LogRecord>, TaskLogsError> {
        let response = self
            .search_all(query::search_body(query, self.config.max_results))
            .await?;
        let records = query::decode_hits(&response)?;
        let total = query::total_hits(&response).unwrap_or_default();
        if total > records.len() as u64 {
            tracing::warn!(
                total,
                returned = records.len(),
                max_results = self.config.max_results,
                "read truncated to the newest max_results records"
            );
        }
        Ok(records)
    }
}

/// Body of a successful response, or the status and body of a failed one.
async fn read_json(response: reqwest::Response) -> Result<Value, TaskLogsError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TaskLogsError::Backend {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

#[async_trait]
impl LogWriter for ElasticsearchBackend {
    #[instrument(skip_all, err, fields(job_id = %record.job_id, log_type = %record.log_type()))]
    async fn write(&self, record: LogRecord) -> Result<(), TaskLogsError> {
        let index = self.index_for(record.timestamp)?;
        let url = format!(
            "{}/{index}/_doc?refresh={}",
            self.base_url, self.config.force_refresh
        );
        let response = self.client.post(url).json(&record).send().await?;
        read_json(response).await?;
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[async_trait]
impl LogReader for ElasticsearchBackend {
    #[instrument(skip(self), err)]
    async fn logs_by_type(
        &self,
        log_type: Option<LogType>,
    ) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.query(query::by_type(log_type)).await
    }

    #[instrument(skip(self), err)]
    async fn find_job(&self, job_id: &JobId) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.query(query::by_job(job_id)).await
    }

    #[instrument(skip(self), err)]
    async fn search(&self, query: &str) -> Result<Vec<LogRecord>, TaskLogsError> {
        self.query(query::query_string(query)).await
    }

    async fn list_tasks(&self) -> Result<Vec<TaskId>, TaskLogsError> {
        let response = self
            .search_all(query::tasks_body(self.config.max_results))
            .await?;
        query::decode_task_buckets(&response)
    }
}
