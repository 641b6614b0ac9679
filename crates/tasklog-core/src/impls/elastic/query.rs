//! Query construction and response decoding.

use chrono::NaiveDateTime;
use serde_json::{Map, Value, json};

use crate::domain::{JobId, LogRecord, LogType, TaskId, TaskLogsError};

const WHOLE_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

pub fn match_all() -> Value {
    json!({"match_all": {}})
}

/// Exact match on a keyword field.
pub fn term(field: &str, value: &str) -> Value {
    json!({"term": {field: value}})
}

/// Free text handed to the engine's query-string parser.
pub fn query_string(query: &str) -> Value {
    json!({"query_string": {"query": query}})
}

pub fn by_type(log_type: Option<LogType>) -> Value {
    match log_type {
        Some(log_type) => term("type", log_type.as_str()),
        None => match_all(),
    }
}

pub fn by_job(job_id: &JobId) -> Value {
    term("job_id", job_id.as_str())
}

/// Search request body; always newest first.
pub fn search_body(query: Value, size: usize) -> Value {
    json!({
        "query": query,
        "sort": [{"timestamp": {"order": "desc"}}],
        "size": size,
    })
}

/// Distinct task ids via a terms aggregation.
pub fn tasks_body(size: usize) -> Value {
    json!({
        "size": 0,
        "aggs": {"tasks": {"terms": {"field": "task_id", "size": size}}},
    })
}

/// Decode `hits.hits[]._source` into records, keeping response order.
pub fn decode_hits(response: &Value) -> Result<Vec<LogRecord>, TaskLogsError> {
    let Some(hits) = response.pointer("/hits/hits") else {
        return Err(TaskLogsError::MalformedDocument(
            "response has no hits section".to_string(),
        ));
    };
    let Some(hits) = hits.as_array() else {
        return Ok(Vec::new());
    };

    hits.iter()
        .map(|hit| {
            let source = hit.get("_source").cloned().ok_or_else(|| {
                TaskLogsError::MalformedDocument("hit without _source".to_string())
            })?;
            decode_document(source)
        })
        .collect()
}

/// `hits.total`, in either the object form (`{"value": n}`) or the bare
/// number older engines return.
pub fn total_hits(response: &Value) -> Option<u64> {
    let total = response.pointer("/hits/total")?;
    total
        .get("value")
        .and_then(Value::as_u64)
        .or_else(|| total.as_u64())
}

pub fn decode_task_buckets(response: &Value) -> Result<Vec<TaskId>, TaskLogsError> {
    let buckets = response
        .pointer("/aggregations/tasks/buckets")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            TaskLogsError::MalformedDocument("response has no tasks aggregation".to_string())
        })?;

    let mut tasks: Vec<TaskId> = buckets
        .iter()
        .filter_map(|bucket| bucket.get("key").and_then(Value::as_str))
        .map(TaskId::from)
        .collect();
    tasks.sort();
    Ok(tasks)
}

/// Turn one stored document back into a record, dispatching on `type`.
pub fn decode_document(mut source: Value) -> Result<LogRecord, TaskLogsError> {
    let doc = source
        .as_object_mut()
        .ok_or_else(|| TaskLogsError::MalformedDocument("_source is not an object".to_string()))?;

    let log_type: LogType = doc
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| TaskLogsError::MalformedDocument("missing type".to_string()))?
        .parse()?;

    normalize_datetime(doc, "timestamp")?;
    match log_type {
        LogType::Enqueued => {
            if let Some(job) = doc.get_mut("job").and_then(Value::as_object_mut) {
                normalize_datetime(job, "execute_at")?;
            }
        }
        LogType::Dequeued | LogType::Completed | LogType::Exception | LogType::Failed => {}
    }

    serde_json::from_value(source).map_err(|e| TaskLogsError::MalformedDocument(e.to_string()))
}

/// Rewrite a stored date as whole-second UTC, dropping any fractional
/// seconds or offset suffix. Absent or null values are left alone.
fn normalize_datetime(doc: &mut Map<String, Value>, field: &str) -> Result<(), TaskLogsError> {
    let Some(value) = doc.get_mut(field) else {
        return Ok(());
    };
    let Some(raw) = value.as_str() else {
        return Ok(());
    };

    let parsed = raw
        .get(..19)
        .and_then(|head| NaiveDateTime::parse_from_str(head, WHOLE_SECONDS).ok())
        .ok_or_else(|| TaskLogsError::MalformedDocument(format!("bad {field}: {raw}")))?;

    *value = Value::String(parsed.and_utc().format("%Y-%m-%dT%H:%M:%SZ").to_string());
    Ok(())
}
