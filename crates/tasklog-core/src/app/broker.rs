//! StubBroker - テスト・デモ用の最小キューフレームワーク
//!
//! 実際のフレームワークの代わりに、ミドルウェアの各フックを本物と同じ順序で呼びます。
//!
//! # 設計
//! - actor とミドルウェアは初期化時に登録（`&mut self`）
//! - 実行時は不変、キューだけ Mutex で保護
//! - `join()` で FIFO にすべて処理する（eta は記録のみで待たない）
//! - 失敗した handler は `max_retries` 回まで再投入、その後 nack

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::policy::LOG_OPTION;
use crate::domain::{TaskId, TaskLogsError};
use crate::ports::{ActorInfo, BrokerContext, HandlerError, LifecycleHooks, Message};

pub const DEFAULT_QUEUE: &str = "default";

/// The body of an actor.
#[async_trait]
pub trait ActorHandler: Send + Sync {
    async fn call(&self, args: &[Value], kwargs: &Map<String, Value>)
    -> Result<Value, HandlerError>;
}

#[async_trait]
impl<F> ActorHandler for F
where
    F: Fn(&[Value], &Map<String, Value>) -> Result<Value, HandlerError> + Send + Sync,
{
    async fn call(
        &self,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, HandlerError> {
        self(args, kwargs)
    }
}

/// A registered handler definition.
pub struct Actor {
    name: TaskId,
    queue: String,
    task_path: Option<String>,
    options: Map<String, Value>,
    handler: Arc<dyn ActorHandler>,
}

impl Actor {
    pub fn new(name: impl Into<TaskId>, handler: Arc<dyn ActorHandler>) -> Self {
        Self {
            name: name.into(),
            queue: DEFAULT_QUEUE.to_string(),
            task_path: None,
            options: Map::new(),
            handler,
        }
    }

    /// Actor backed by a plain function.
    pub fn from_fn<F>(name: impl Into<TaskId>, f: F) -> Self
    where
        F: Fn(&[Value], &Map<String, Value>) -> Result<Value, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, Arc::new(f))
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_task_path(mut self, task_path: impl Into<String>) -> Self {
        self.task_path = Some(task_path.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Shorthand for the `log` actor option.
    pub fn with_log(self, log: bool) -> Self {
        self.with_option(LOG_OPTION, Value::Bool(log))
    }

    pub fn name(&self) -> &TaskId {
        &self.name
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    fn info(&self) -> ActorInfo {
        ActorInfo {
            task_path: self.task_path.clone(),
            options: self.options.clone(),
        }
    }
}

struct Pending {
    message: Message,
    failures: u32,
}

pub struct StubBroker {
    actors: HashMap<TaskId, Actor>,
    middleware: Vec<Arc<dyn LifecycleHooks>>,
    queue: Mutex<VecDeque<Pending>>,
    max_retries: u32,
}

impl Default for StubBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl StubBroker {
    pub fn new() -> Self {
        Self {
            actors: HashMap::new(),
            middleware: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            max_retries: 0,
        }
    }

    /// How many times a failing message is re-enqueued before it is nacked.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Middleware must be added before the actors that use its options.
    pub fn add_middleware(&mut self, middleware: Arc<dyn LifecycleHooks>) {
        self.middleware.push(middleware);
    }

    /// Register an actor.
    ///
    /// Fails on a duplicate name or on an option no middleware accepts.
    pub fn declare_actor(&mut self, actor: Actor) -> Result<(), TaskLogsError> {
        if self.actors.contains_key(&actor.name) {
            return Err(TaskLogsError::DuplicateActor(actor.name));
        }
        if let Some(unknown) = actor.options.keys().find(|key| {
            !self
                .middleware
                .iter()
                .any(|m| m.actor_options().contains(&key.as_str()))
        }) {
            return Err(TaskLogsError::Config(format!(
                "actor {} has unknown option {unknown}",
                actor.name
            )));
        }

        tracing::debug!(actor = %actor.name, queue = %actor.queue, "actor declared");
        self.actors.insert(actor.name.clone(), actor);
        Ok(())
    }

    pub async fn send(
        &self,
        actor: &TaskId,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Message, TaskLogsError> {
        self.send_with_options(actor, args, kwargs, Map::new()).await
    }

    /// Send with per-call options (e.g. `{"log": false}`).
    pub async fn send_with_options(
        &self,
        actor: &TaskId,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        options: Map<String, Value>,
    ) -> Result<Message, TaskLogsError> {
        let mut message = self.build_message(actor, args, kwargs)?;
        message.options = options;
        self.enqueue(message, None, 0).await
    }

    /// Send with an eta `delay` from now.
    pub async fn send_with_delay(
        &self,
        actor: &TaskId,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        delay: Duration,
    ) -> Result<Message, TaskLogsError> {
        let message = self.build_message(actor, args, kwargs)?;
        self.enqueue(message, Some(delay), 0).await
    }

    /// Process every queued message, including retries, in FIFO order.
    pub async fn join(&self) -> Result<(), TaskLogsError> {
        while let Some(Pending { message, failures }) = self.pop().await {
            let actor = self
                .actors
                .get(&message.actor_name)
                .ok_or_else(|| TaskLogsError::ActorNotFound(message.actor_name.clone()))?;

            for m in &self.middleware {
                m.before_process_message(self, &message).await?;
            }

            let outcome = actor.handler.call(&message.args, &message.kwargs).await;
            for m in &self.middleware {
                m.after_process_message(self, &message, outcome.as_ref())
                    .await?;
            }

            let Err(err) = outcome else {
                continue;
            };
            let failures = failures + 1;
            if failures <= self.max_retries {
                tracing::debug!(job_id = %message.message_id, failures, error = %err, "retrying");
                self.enqueue(message, None, failures).await?;
            } else {
                tracing::warn!(job_id = %message.message_id, failures, error = %err, "message nacked");
                for m in &self.middleware {
                    m.after_nack(self, &message).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn queued(&self) -> usize {
        self.queue.lock().await.len()
    }

    fn build_message(
        &self,
        actor: &TaskId,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Message, TaskLogsError> {
        let definition = self
            .actors
            .get(actor)
            .ok_or_else(|| TaskLogsError::ActorNotFound(actor.clone()))?;

        let mut message = Message::new(actor.clone(), definition.queue.clone());
        message.args = args;
        message.kwargs = kwargs;
        Ok(message)
    }

    async fn enqueue(
        &self,
        mut message: Message,
        delay: Option<Duration>,
        failures: u32,
    ) -> Result<Message, TaskLogsError> {
        if let Some(delay) = delay {
            let delay = chrono::Duration::from_std(delay)
                .map_err(|e| TaskLogsError::Config(format!("delay out of range: {e}")))?;
            let eta = Utc::now()
                .checked_add_signed(delay)
                .ok_or_else(|| TaskLogsError::Config(format!("delay out of range: {delay}")))?;
            message.eta = Some(eta);
        }

        self.queue.lock().await.push_back(Pending {
            message: message.clone(),
            failures,
        });
        for m in &self.middleware {
            m.after_enqueue(self, &message, delay).await?;
        }
        Ok(message)
    }

    async fn pop(&self) -> Option<Pending> {
        self.queue.lock().await.pop_front()
    }
}

impl BrokerContext for StubBroker {
    fn actor(&self, actor_name: &TaskId) -> Option<ActorInfo> {
        self.actors.get(actor_name).map(Actor::info)
    }
}
