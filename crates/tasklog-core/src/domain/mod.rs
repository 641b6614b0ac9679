//! Domain model (IDs, job details, log records, errors).

pub mod errors;
pub mod ids;
pub mod job;
pub mod record;

pub use errors::{TaskLogsError, render_error};
pub use ids::{JobId, TaskId};
pub use job::JobDetails;
pub use record::{LogEvent, LogRecord, LogType, sort_newest_first};
