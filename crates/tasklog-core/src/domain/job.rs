//! Job details captured at enqueue time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Describes a unit of work as it was accepted onto a queue.
///
/// Written once inside an `enqueued` record. `with_args` collects any
/// iterator into a `Vec` up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    pub queue: String,

    /// Resolvable identity of the handler (`module.function`), if known.
    pub task_path: Option<String>,

    /// Scheduled execution time for delayed jobs.
    pub execute_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,

    /// Free-form framework options (time limits, the `log` flag, ...).
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl JobDetails {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            task_path: None,
            execute_at: None,
            args: Vec::new(),
            kwargs: Map::new(),
            options: Map::new(),
        }
    }

    pub fn with_task_path(mut self, task_path: impl Into<String>) -> Self {
        self.task_path = Some(task_path.into());
        self
    }

    pub fn with_execute_at(mut self, execute_at: Option<DateTime<Utc>>) -> Self {
        self.execute_at = execute_at;
        self
    }

    pub fn with_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.args = args.into_iter().collect();
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }
}
