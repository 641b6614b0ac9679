//! TaskLogsMiddleware - ライフサイクルフックをログレコードに変換する
//!
//! # フロー
//! 1. `after_enqueue` → `enqueued`（キュー名・task path・引数・実行予定時刻）
//! 2. `before_process_message` → `dequeued`
//! 3. `after_process_message` → 成功なら `completed`、失敗なら `exception`
//! 4. `after_nack` → `failed`（または `NackRecord::Exception` 設定時は `exception`）
//!
//! どのフックも `log` オプションを確認し、無効なら何も書きません。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::policy::{self, LOG_OPTION};
use crate::domain::{JobDetails, TaskLogsError, render_error};
use crate::ports::{BrokerContext, HandlerError, LifecycleHooks, LogWriter, Message};

/// Text stored when a nack is recorded as an exception.
pub const NACK_EXCEPTION_TEXT: &str = "Failed";

/// Record written when the framework gives up on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NackRecord {
    #[default]
    Failed,

    /// An `exception` record with the text `"Failed"`.
    Exception,
}

pub struct TaskLogsMiddleware<W: ?Sized + LogWriter = dyn LogWriter> {
    writer: Arc<W>,
    nack: NackRecord,
}

impl<W: ?Sized + LogWriter> TaskLogsMiddleware<W> {
    pub fn new(writer: Arc<W>) -> Self {
        Self {
            writer,
            nack: NackRecord::default(),
        }
    }

    pub fn with_nack_record(mut self, nack: NackRecord) -> Self {
        self.nack = nack;
        self
    }

    pub fn writer(&self) -> &Arc<W> {
        &self.writer
    }

    /// Per-send `log` option first, then the actor's, then on.
    pub fn should_log(&self, broker: &dyn BrokerContext, message: &Message) -> bool {
        let per_call = policy::log_flag(&message.options);
        let per_actor = broker
            .actor(&message.actor_name)
            .and_then(|actor| policy::log_flag(&actor.options));
        policy::resolve(per_call, per_actor)
    }
}

impl<W: ?Sized + LogWriter> Clone for TaskLogsMiddleware<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            nack: self.nack,
        }
    }
}

#[async_trait]
impl<W: ?Sized + LogWriter> LifecycleHooks for TaskLogsMiddleware<W> {
    fn actor_options(&self) -> &'static [&'static str] {
        &[LOG_OPTION]
    }

    #[instrument(skip_all, err, fields(job_id = %message.message_id, task_id = %message.actor_name))]
    async fn after_enqueue(
        &self,
        broker: &dyn BrokerContext,
        message: &Message,
        _delay: Option<Duration>,
    ) -> Result<(), TaskLogsError> {
        if !self.should_log(broker, message) {
            return Ok(());
        }

        let mut job = JobDetails::new(message.queue_name.clone())
            .with_execute_at(message.eta)
            .with_args(message.args.iter().cloned())
            .with_kwargs(message.kwargs.clone())
            .with_options(message.options.clone());
        if let Some(task_path) = broker
            .actor(&message.actor_name)
            .and_then(|actor| actor.task_path)
        {
            job = job.with_task_path(task_path);
        }

        self.writer
            .write_enqueued(message.message_id.clone(), message.actor_name.clone(), job)
            .await
    }

    #[instrument(skip_all, err, fields(job_id = %message.message_id, task_id = %message.actor_name))]
    async fn before_process_message(
        &self,
        broker: &dyn BrokerContext,
        message: &Message,
    ) -> Result<(), TaskLogsError> {
        if !self.should_log(broker, message) {
            return Ok(());
        }
        self.writer
            .write_dequeued(message.message_id.clone(), message.actor_name.clone())
            .await
    }

    #[instrument(skip_all, err, fields(job_id = %message.message_id, task_id = %message.actor_name))]
    async fn after_process_message(
        &self,
        broker: &dyn BrokerContext,
        message: &Message,
        outcome: Result<&Value, &HandlerError>,
    ) -> Result<(), TaskLogsError> {
        if !self.should_log(broker, message) {
            return Ok(());
        }

        let job_id = message.message_id.clone();
        let task_id = message.actor_name.clone();
        match outcome {
            Ok(result) => {
                self.writer
                    .write_completed(job_id, task_id, result.clone())
                    .await
            }
            Err(err) => {
                self.writer
                    .write_exception(job_id, task_id, render_error(&**err))
                    .await
            }
        }
    }

    #[instrument(skip_all, err, fields(job_id = %message.message_id, task_id = %message.actor_name))]
    async fn after_nack(
        &self,
        broker: &dyn BrokerContext,
        message: &Message,
    ) -> Result<(), TaskLogsError> {
        if !self.should_log(broker, message) {
            return Ok(());
        }

        let job_id = message.message_id.clone();
        let task_id = message.actor_name.clone();
        match self.nack {
            NackRecord::Failed => self.writer.write_failed(job_id, task_id).await,
            NackRecord::Exception => {
                self.writer
                    .write_exception(job_id, task_id, NACK_EXCEPTION_TEXT.to_string())
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LogType, TaskId};
    use crate::impls::MemoryBackend;
    use crate::ports::{ActorInfo, FixedClock, LogReader};
    use chrono::{TimeZone, Utc};
    use serde_json::{Map, json};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Actors(HashMap<TaskId, ActorInfo>);

    impl Actors {
        fn with(mut self, name: &str, task_path: &str, options: Value) -> Self {
            self.0.insert(
                TaskId::new(name),
                ActorInfo {
                    task_path: Some(task_path.to_string()),
                    options: options.as_object().cloned().unwrap_or_default(),
                },
            );
            self
        }
    }

    impl BrokerContext for Actors {
        fn actor(&self, actor_name: &TaskId) -> Option<ActorInfo> {
            self.0.get(actor_name).cloned()
        }
    }

    fn setup() -> (Arc<MemoryBackend>, TaskLogsMiddleware<MemoryBackend>) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2019, 1, 14, 12, 0, 0).unwrap());
        let backend = Arc::new(MemoryBackend::with_clock(Arc::new(clock)));
        let middleware = TaskLogsMiddleware::new(Arc::clone(&backend));
        (backend, middleware)
    }

    fn message(actor: &str) -> Message {
        let mut message = Message::new(TaskId::new(actor), "test");
        message.args = vec![json!("a")];
        message.kwargs = json!({"b": "b"}).as_object().cloned().unwrap();
        message
    }

    #[test]
    fn advertises_log_option() {
        let (_, middleware) = setup();
        assert_eq!(middleware.actor_options(), &["log"]);
    }

    #[tokio::test]
    async fn enqueue_captures_job_details() {
        let (backend, middleware) = setup();
        let broker = Actors::default().with("simple_task", "tests.simple_task", json!({}));
        let mut msg = message("simple_task");
        msg.eta = Some(Utc.with_ymd_and_hms(2019, 1, 14, 13, 0, 0).unwrap());

        middleware
            .after_enqueue(&broker, &msg, Some(Duration::from_secs(3600)))
            .await
            .unwrap();

        let enqueued = backend.enqueued().await.unwrap();
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].job_id, msg.message_id);
        let job = enqueued[0].job().unwrap();
        assert_eq!(job.queue, "test");
        assert_eq!(job.task_path.as_deref(), Some("tests.simple_task"));
        assert_eq!(job.execute_at, msg.eta);
        assert_eq!(job.args, vec![json!("a")]);
        assert_eq!(job.kwargs, msg.kwargs);
    }

    #[tokio::test]
    async fn unknown_actor_has_no_task_path() {
        let (backend, middleware) = setup();
        let msg = message("ghost");

        middleware.after_enqueue(&Actors::default(), &msg, None).await.unwrap();

        let enqueued = backend.enqueued().await.unwrap();
        assert_eq!(enqueued[0].job().unwrap().task_path, None);
    }

    #[tokio::test]
    async fn process_outcomes_become_records() {
        let (backend, middleware) = setup();
        let broker = Actors::default();
        let ok = message("simple_task");
        let bad = message("other_task");

        middleware.before_process_message(&broker, &ok).await.unwrap();
        middleware
            .after_process_message(&broker, &ok, Ok(&json!("hello")))
            .await
            .unwrap();

        let err: HandlerError = "ValueError: boom".into();
        middleware
            .after_process_message(&broker, &bad, Err(&err))
            .await
            .unwrap();

        let completed = backend.completed().await.unwrap();
        assert_eq!(completed[0].result(), Some(&json!("hello")));
        let exception = backend.exception().await.unwrap();
        assert_eq!(exception[0].job_id, bad.message_id);
        assert!(exception[0].exception_text().unwrap().contains("ValueError: boom"));
        assert_eq!(backend.dequeued().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn nack_record_is_configurable() {
        let (backend, middleware) = setup();
        let broker = Actors::default();

        middleware.after_nack(&broker, &message("a")).await.unwrap();
        middleware
            .clone()
            .with_nack_record(NackRecord::Exception)
            .after_nack(&broker, &message("b"))
            .await
            .unwrap();

        assert_eq!(backend.failed().await.unwrap().len(), 1);
        let exception = backend.exception().await.unwrap();
        assert_eq!(exception[0].exception_text(), Some(NACK_EXCEPTION_TEXT));
    }

    #[tokio::test]
    async fn opted_out_actor_writes_nothing() {
        let (backend, middleware) = setup();
        let broker = Actors::default().with("quiet", "tests.quiet", json!({"log": false}));
        let msg = message("quiet");

        middleware.after_enqueue(&broker, &msg, None).await.unwrap();
        middleware.before_process_message(&broker, &msg).await.unwrap();
        middleware
            .after_process_message(&broker, &msg, Ok(&Value::Null))
            .await
            .unwrap();
        middleware.after_nack(&broker, &msg).await.unwrap();

        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn per_call_flag_overrides_actor() {
        let (backend, middleware) = setup();
        let broker = Actors::default().with("quiet", "tests.quiet", json!({"log": false}));
        let mut msg = message("quiet");
        msg.options = Map::from_iter([("log".to_string(), json!(true))]);

        middleware.before_process_message(&broker, &msg).await.unwrap();

        let all = backend.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].log_type(), LogType::Dequeued);
    }

    #[tokio::test]
    async fn works_behind_dyn_writer() {
        let backend = Arc::new(MemoryBackend::new());
        let writer: Arc<dyn LogWriter> = backend.clone();
        let middleware: TaskLogsMiddleware = TaskLogsMiddleware::new(writer);

        middleware
            .before_process_message(&Actors::default(), &message("t"))
            .await
            .unwrap();
        assert_eq!(backend.len().await, 1);
    }
}
