//! Errors - エラー型とエラーレポート
//!
//! - バックエンド障害（HTTP / IO）はそのまま呼び出し元へ返す（リトライしない）
//! - 保存済みデータが壊れている場合は読み出し失敗として返す
//! - タスク実行時の例外は [`render_error`] でテキスト化して記録する

use std::error::Error as StdError;
use std::fmt::Write as _;

use thiserror::Error;

use super::ids::TaskId;

#[derive(Debug, Error)]
pub enum TaskLogsError {
    #[error("http request to backend failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend responded with status {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed record on line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("unknown log type: {0}")]
    UnknownLogType(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("duplicate actor: {0}")]
    DuplicateActor(TaskId),

    #[error("actor not found: {0}")]
    ActorNotFound(TaskId),
}

/// Formats an error and its `source()` chain into the text stored in
/// `exception` records.
///
/// The first line is the error's `Debug` form (type and fields), followed by
/// its `Display` message and one `Caused by:` line per source.
pub fn render_error(err: &(dyn StdError + 'static)) -> String {
    let mut out = format!("{err:?}\n{err}");
    let mut source = err.source();
    while let Some(cause) = source {
        // String への書き込みは失敗しない
        let _ = write!(out, "\nCaused by: {cause}");
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("could not load config")]
    struct Outer {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn render_error_includes_source_chain() {
        let err = Outer {
            inner: std::io::Error::new(std::io::ErrorKind::NotFound, "settings.yaml missing"),
        };

        let text = render_error(&err);
        assert!(text.starts_with("Outer {"));
        assert!(text.contains("could not load config"));
        assert!(text.contains("Caused by: settings.yaml missing"));
    }

    #[test]
    fn render_error_for_plain_message() {
        let err: Box<dyn StdError + Send + Sync> = "Expected".into();
        let text = render_error(err.as_ref());
        assert!(text.contains("Expected"));
    }
}
