//! Config - バックエンド選択と接続
//!
//! YAML ファイルから読み込み、環境変数で上書きできます。
//!
//! # 使用例
//! ```yaml
//! backend:
//!   kind: elasticsearch
//!   url: http://localhost:9200
//!   index_postfix: "%Y.%m"
//!   force_refresh: true
//! nack_record: exception
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::NackRecord;
use crate::domain::TaskLogsError;
use crate::impls::elastic::mapping::DEFAULT_INDEX_POSTFIX;
use crate::impls::{ElasticConfig, ElasticsearchBackend, FileBackend, MemoryBackend};
use crate::ports::LogBackend;

/// Selects an Elasticsearch backend at this URL.
pub const ENV_ELASTICSEARCH_URL: &str = "TASK_LOGS_ELASTICSEARCH_URL";

/// Selects a file backend at this path.
pub const ENV_FILE: &str = "TASK_LOGS_FILE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskLogsConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    /// Record written by `after_nack`.
    #[serde(default)]
    pub nack_record: NackRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    #[default]
    Memory,
    File {
        path: PathBuf,
    },
    Elasticsearch {
        url: String,
        #[serde(default = "default_index_postfix")]
        index_postfix: String,
        #[serde(default)]
        force_refresh: bool,
        #[serde(default = "default_max_results")]
        max_results: usize,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_index_postfix() -> String {
    DEFAULT_INDEX_POSTFIX.to_string()
}

fn default_max_results() -> usize {
    10_000
}

fn default_timeout_secs() -> u64 {
    30
}

impl BackendConfig {
    pub fn elasticsearch(url: impl Into<String>) -> Self {
        Self::Elasticsearch {
            url: url.into(),
            index_postfix: default_index_postfix(),
            force_refresh: false,
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File { .. } => "file",
            Self::Elasticsearch { .. } => "elasticsearch",
        }
    }
}

impl TaskLogsConfig {
    /// Apply `TASK_LOGS_ELASTICSEARCH_URL` / `TASK_LOGS_FILE` from the process
    /// environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::with_env_overrides`] with an injected lookup.
    /// The Elasticsearch URL takes precedence over the file path.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_ELASTICSEARCH_URL) {
            self.backend = BackendConfig::elasticsearch(url);
        } else if let Some(path) = non_empty(ENV_FILE) {
            self.backend = BackendConfig::File { path: path.into() };
        }
        self
    }

    /// Open the configured backend.
    pub async fn connect(&self) -> Result<Arc<dyn LogBackend>, TaskLogsError> {
        tracing::info!(kind = self.backend.kind(), "connecting task log backend");

        let backend: Arc<dyn LogBackend> = match &self.backend {
            BackendConfig::Memory => Arc::new(MemoryBackend::new()),
            BackendConfig::File { path } => Arc::new(FileBackend::new(path.clone())),
            BackendConfig::Elasticsearch {
                url,
                index_postfix,
                force_refresh,
                max_results,
                timeout_secs,
            } => {
                let config = ElasticConfig {
                    url: url.clone(),
                    index_postfix: index_postfix.clone(),
                    force_refresh: *force_refresh,
                    max_results: *max_results,
                    timeout: Duration::from_secs(*timeout_secs),
                };
                Arc::new(ElasticsearchBackend::connect(config).await?)
            }
        };
        Ok(backend)
    }
}

/// Load configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TaskLogsConfig, TaskLogsError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(yaml: &str) -> Result<TaskLogsConfig, TaskLogsError> {
    serde_yaml::from_str(yaml).map_err(|e| TaskLogsError::Config(e.to_string()))
}
