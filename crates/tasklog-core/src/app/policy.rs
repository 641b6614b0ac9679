//! Opt-out policy for the `log` option.
//!
//! The flag may be set on the actor definition and on each send.
//! The per-send value wins; with neither set, logging stays on.

use serde_json::{Map, Value};

/// Name of the option read from actor and message options.
pub const LOG_OPTION: &str = "log";

/// Decide whether a message is logged.
pub fn resolve(per_call: Option<bool>, per_actor: Option<bool>) -> bool {
    per_call.or(per_actor).unwrap_or(true)
}

/// Read the `log` flag from an options map.
///
/// A missing or `null` value is unset. Any other non-boolean is treated as
/// unset too, with a warning.
pub fn log_flag(options: &Map<String, Value>) -> Option<bool> {
    match options.get(LOG_OPTION) {
        None | Some(Value::Null) => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(other) => {
            tracing::warn!(value = %other, "ignoring non-boolean `log` option");
            None
        }
    }
}
