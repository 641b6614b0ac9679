//! Lifecycle port - キューフレームワークが呼び出すフック
//!
//! フレームワーク本体はこのクレートの外側にある不透明な呼び出し元として扱います。
//! フレームワークは各ライフサイクルイベントで `LifecycleHooks` のメソッドを呼び、
//! `BrokerContext` を通じて actor 定義を参照させます。

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::domain::{JobId, TaskId, TaskLogsError};

/// Error raised by a task handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A message as seen by the hooks: one send of one actor.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: JobId,
    pub actor_name: TaskId,
    pub queue_name: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,

    /// Per-send options (may carry the `log` flag).
    pub options: Map<String, Value>,

    /// When the message becomes eligible for processing, for delayed sends.
    pub eta: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(actor_name: TaskId, queue_name: impl Into<String>) -> Self {
        Self {
            message_id: JobId::generate(),
            actor_name,
            queue_name: queue_name.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            options: Map::new(),
            eta: None,
        }
    }
}

/// What the framework knows about a registered actor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActorInfo {
    /// `module.function` style identity of the handler.
    pub task_path: Option<String>,

    /// Options declared on the actor definition.
    pub options: Map<String, Value>,
}

/// Broker-side context handed to every hook.
pub trait BrokerContext: Send + Sync {
    fn actor(&self, actor_name: &TaskId) -> Option<ActorInfo>;
}

/// One method per lifecycle event.
///
/// Errors returned from a hook are not handled here; they belong to the
/// framework's own error path.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// Actor options this middleware understands (e.g. `log`).
    fn actor_options(&self) -> &'static [&'static str] {
        &[]
    }

    /// A message was accepted onto a queue.
    async fn after_enqueue(
        &self,
        broker: &dyn BrokerContext,
        message: &Message,
        delay: Option<Duration>,
    ) -> Result<(), TaskLogsError>;

    /// A worker is about to run the message.
    async fn before_process_message(
        &self,
        broker: &dyn BrokerContext,
        message: &Message,
    ) -> Result<(), TaskLogsError>;

    /// The message ran; `outcome` is the handler's result or error.
    async fn after_process_message(
        &self,
        broker: &dyn BrokerContext,
        message: &Message,
        outcome: Result<&Value, &HandlerError>,
    ) -> Result<(), TaskLogsError>;

    /// The framework rejected the message for good.
    async fn after_nack(
        &self,
        broker: &dyn BrokerContext,
        message: &Message,
    ) -> Result<(), TaskLogsError>;
}
