//! Index template for task log documents.

use serde_json::{Value, json};

/// Every period index starts with this prefix.
pub const INDEX_PREFIX: &str = "task-logs-";

pub const TEMPLATE_NAME: &str = "task-logs-template";

/// Default period: one index per calendar day.
pub const DEFAULT_INDEX_POSTFIX: &str = "%Y.%m.%d";

/// Object-typed fields (`args`, `kwargs`, `options`, `result`) are stored
/// but not indexed; scalar fields are keywords; `exception` is full text.
pub fn task_logs_mapping() -> Value {
    json!({
        "dynamic": "strict",
        "properties": {
            "timestamp": {"type": "date"},
            "job_id": {"type": "keyword"},
            "task_id": {"type": "keyword"},
            "type": {"type": "keyword"},
            "result": {"enabled": false, "type": "object"},
            "exception": {"type": "text"},
            "job": {
                "dynamic": "false",
                "properties": {
                    "queue": {"type": "keyword"},
                    "task_path": {"type": "keyword"},
                    "execute_at": {"type": "date"},
                    "args": {"enabled": false, "type": "object"},
                    "kwargs": {"enabled": false, "type": "object"},
                    "options": {"enabled": false, "type": "object"},
                },
            },
        },
    })
}

pub fn task_logs_template() -> Value {
    json!({
        "index_patterns": [format!("{INDEX_PREFIX}*")],
        "mappings": task_logs_mapping(),
        "version": 1,
    })
}
