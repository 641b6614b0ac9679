//! End-to-end lifecycle scenarios: StubBroker → TaskLogsMiddleware → backend.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rstest::rstest;
use serde_json::{Map, Value, json};
use tempfile::TempDir;

use super::{Actor, StubBroker, TaskLogsMiddleware};
use crate::config::{ENV_ELASTICSEARCH_URL, TaskLogsConfig};
use crate::domain::{LogRecord, LogType, TaskId};
use crate::impls::{ElasticConfig, ElasticsearchBackend, FileBackend, MemoryBackend};
use crate::ports::{LogBackend, LogReader, TickingClock};

#[derive(Debug, Clone, Copy)]
enum Kind {
    Memory,
    File,
}

/// Backend plus whatever must outlive it.
struct Harness {
    backend: Arc<dyn LogBackend>,
    broker: StubBroker,
    _dir: Option<TempDir>,
}

fn clock() -> Arc<TickingClock> {
    Arc::new(TickingClock::new(
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
        chrono::Duration::seconds(1),
    ))
}

fn kwargs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn broker_over(backend: Arc<dyn LogBackend>) -> StubBroker {
    let mut broker = StubBroker::new();
    broker.add_middleware(Arc::new(TaskLogsMiddleware::new(backend)));
    broker
        .declare_actor(
            Actor::from_fn("simple_task", |_, _| Ok(json!("hello")))
                .with_queue("test")
                .with_task_path("tests.simple_task"),
        )
        .unwrap();
    broker
        .declare_actor(
            Actor::from_fn("failing_task", |_, _| Err("ValueError: boom".into()))
                .with_queue("test"),
        )
        .unwrap();
    broker
        .declare_actor(
            Actor::from_fn("quiet_task", |_, _| Ok(Value::Null))
                .with_queue("test")
                .with_log(false),
        )
        .unwrap();
    broker
}

fn harness(kind: Kind) -> Harness {
    let (backend, dir) = match kind {
        Kind::Memory => {
            let backend: Arc<dyn LogBackend> = Arc::new(MemoryBackend::with_clock(clock()));
            (backend, None)
        }
        Kind::File => {
            let dir = tempfile::tempdir().unwrap();
            let backend: Arc<dyn LogBackend> = Arc::new(FileBackend::with_clock(
                dir.path().join("task-logs.jsonl"),
                clock(),
            ));
            (backend, Some(dir))
        }
    };
    Harness {
        broker: broker_over(Arc::clone(&backend)),
        backend,
        _dir: dir,
    }
}

fn simple() -> TaskId {
    TaskId::new("simple_task")
}

#[rstest]
#[case::memory(Kind::Memory)]
#[case::file(Kind::File)]
#[tokio::test]
async fn successful_job_is_logged_end_to_end(#[case] kind: Kind) {
    let h = harness(kind);

    let message = h
        .broker
        .send(&simple(), vec![json!("a")], kwargs(json!({"b": "b"})))
        .await
        .unwrap();

    let enqueued = h.backend.enqueued().await.unwrap();
    assert_eq!(enqueued.len(), 1);
    assert_eq!(enqueued[0].job_id, message.message_id);
    assert_eq!(enqueued[0].task_id, simple());
    let job = enqueued[0].job().unwrap();
    assert_eq!(job.queue, "test");
    assert_eq!(job.task_path.as_deref(), Some("tests.simple_task"));
    assert_eq!(job.args, vec![json!("a")]);
    assert_eq!(job.kwargs, kwargs(json!({"b": "b"})));
    assert_eq!(job.execute_at, None);

    h.broker.join().await.unwrap();

    let dequeued = h.backend.dequeued().await.unwrap();
    let completed = h.backend.completed().await.unwrap();
    assert_eq!(dequeued.len(), 1);
    assert_eq!(completed.len(), 1);
    assert_eq!(dequeued[0].job_id, message.message_id);
    assert_eq!(completed[0].job_id, message.message_id);
    assert_eq!(completed[0].result(), Some(&json!("hello")));
    assert!(h.backend.exception().await.unwrap().is_empty());
    assert!(h.backend.failed().await.unwrap().is_empty());
}

#[rstest]
#[case::memory(Kind::Memory)]
#[case::file(Kind::File)]
#[tokio::test]
async fn failing_job_records_exception_then_failure(#[case] kind: Kind) {
    let h = harness(kind);

    let message = h
        .broker
        .send(&TaskId::new("failing_task"), vec![], Map::new())
        .await
        .unwrap();
    h.broker.join().await.unwrap();

    let exception = h.backend.exception().await.unwrap();
    assert_eq!(exception.len(), 1);
    assert_eq!(exception[0].job_id, message.message_id);
    assert!(exception[0].exception_text().unwrap().contains("ValueError: boom"));
    assert!(h.backend.completed().await.unwrap().is_empty());

    let types: Vec<LogType> = h
        .backend
        .find_job(&message.message_id)
        .await
        .unwrap()
        .iter()
        .map(LogRecord::log_type)
        .collect();
    assert_eq!(
        types,
        vec![
            LogType::Failed,
            LogType::Exception,
            LogType::Dequeued,
            LogType::Enqueued,
        ]
    );
}

#[rstest]
#[case::memory(Kind::Memory)]
#[case::file(Kind::File)]
#[tokio::test]
async fn all_is_the_union_of_every_type(#[case] kind: Kind) {
    let h = harness(kind);
    h.broker.send(&simple(), vec![], Map::new()).await.unwrap();
    h.broker
        .send(&TaskId::new("failing_task"), vec![], Map::new())
        .await
        .unwrap();
    h.broker.join().await.unwrap();

    let all = h.backend.all().await.unwrap();
    assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

    let mut per_type = Vec::new();
    for log_type in LogType::ALL {
        per_type.extend(h.backend.logs_by_type(Some(log_type)).await.unwrap());
    }
    assert_eq!(per_type.len(), all.len());

    let key = |r: &LogRecord| (r.timestamp, r.job_id.to_string(), r.log_type());
    let from_all: BTreeSet<_> = all.iter().map(key).collect();
    let from_types: BTreeSet<_> = per_type.iter().map(key).collect();
    assert_eq!(from_all, from_types);
    assert_eq!(from_all.len(), all.len());

    assert_eq!(h.backend.list_tasks().await.unwrap(), vec![
        TaskId::new("failing_task"),
        simple(),
    ]);
}

#[rstest]
#[case::memory(Kind::Memory)]
#[case::file(Kind::File)]
#[tokio::test]
async fn search_by_job_id_finds_the_whole_job(#[case] kind: Kind) {
    let h = harness(kind);
    let first = h.broker.send(&simple(), vec![], Map::new()).await.unwrap();
    h.broker.send(&simple(), vec![], Map::new()).await.unwrap();
    h.broker.join().await.unwrap();

    let found = h.backend.search(first.message_id.as_str()).await.unwrap();
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|r| r.job_id == first.message_id));
    assert_eq!(found, h.backend.find_job(&first.message_id).await.unwrap());
}

#[rstest]
#[case::memory(Kind::Memory)]
#[case::file(Kind::File)]
#[tokio::test]
async fn log_option_opts_out(#[case] kind: Kind) {
    let h = harness(kind);

    h.broker
        .send_with_options(&simple(), vec![], Map::new(), kwargs(json!({"log": false})))
        .await
        .unwrap();
    h.broker
        .send(&TaskId::new("quiet_task"), vec![], Map::new())
        .await
        .unwrap();
    h.broker.join().await.unwrap();
    assert!(h.backend.all().await.unwrap().is_empty());

    let loud = h
        .broker
        .send_with_options(
            &TaskId::new("quiet_task"),
            vec![],
            Map::new(),
            kwargs(json!({"log": true})),
        )
        .await
        .unwrap();
    h.broker.join().await.unwrap();

    let all = h.backend.all().await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|r| r.job_id == loud.message_id));
}

#[rstest]
#[case::memory(Kind::Memory)]
#[case::file(Kind::File)]
#[tokio::test]
async fn delayed_send_records_execute_at(#[case] kind: Kind) {
    let h = harness(kind);

    let message = h
        .broker
        .send_with_delay(&simple(), vec![], Map::new(), Duration::from_secs(3600))
        .await
        .unwrap();

    let enqueued = h.backend.enqueued().await.unwrap();
    assert_eq!(enqueued[0].job().unwrap().execute_at, message.eta);
    assert!(message.eta.is_some());
}

/// Runs against a real cluster when `TASK_LOGS_ELASTICSEARCH_URL` is set.
/// Without it the test is skipped, except under CI where it must run.
#[tokio::test]
async fn live_elasticsearch_round_trip() {
    let Some(url) = std::env::var(ENV_ELASTICSEARCH_URL)
        .ok()
        .filter(|v| !v.is_empty())
    else {
        assert!(
            std::env::var_os("CI").is_none(),
            "{ENV_ELASTICSEARCH_URL} must be set in CI"
        );
        return;
    };

    let backend: Arc<dyn LogBackend> = Arc::new(
        ElasticsearchBackend::connect(ElasticConfig::new(url).with_force_refresh(true))
            .await
            .unwrap(),
    );
    let broker = broker_over(Arc::clone(&backend));

    let message = broker
        .send(&simple(), vec![json!("a")], kwargs(json!({"b": "b"})))
        .await
        .unwrap();
    broker.join().await.unwrap();

    let records = backend.find_job(&message.message_id).await.unwrap();
    let types: BTreeSet<LogType> = records.iter().map(LogRecord::log_type).collect();
    assert_eq!(
        types,
        BTreeSet::from([LogType::Enqueued, LogType::Dequeued, LogType::Completed])
    );
    assert_eq!(records.len(), 3);

    let config = TaskLogsConfig::default().with_env_overrides();
    assert_eq!(config.backend.kind(), "elasticsearch");
}
