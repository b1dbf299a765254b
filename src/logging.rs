//! Query logging: one [`CommandRecord`] per dispatched command.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::types::Value;

/// Sink for query log entries.
pub trait Logger: Send + Sync {
    /// Record a debug-level `message` with a structured `context`.
    fn debug(&self, message: &str, context: &Map<String, JsonValue>);
}

/// Metadata captured for one successfully executed command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRecord {
    pub command: String,
    pub args: Vec<Value>,
    /// Wall time spent in the driver, in whole microseconds.
    pub elapsed_us: u64,
    /// Elements affected or returned, see [`Value::affected_count`].
    pub affected: usize,
}

impl CommandRecord {
    /// The record as a JSON object, used as the log entry's context.
    #[must_use]
    pub fn to_context(&self) -> Map<String, JsonValue> {
        match serde_json::to_value(self) {
            Ok(JsonValue::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command.to_ascii_uppercase())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Run `call`, then hand one [`CommandRecord`] describing it to `logger`.
///
/// The reply is returned exactly as `call` produced it. A failing call is returned
/// without emitting a record.
///
/// # Errors
/// Returns the error raised by `call`, unchanged.
pub fn record_command<F>(logger: &dyn Logger, command: &str, args: &[Value], call: F) -> Result<Value>
where
    F: FnOnce(&[Value]) -> Result<Value>,
{
    let started = Instant::now();
    let reply = call(args)?;
    let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    let record = CommandRecord {
        command: command.to_string(),
        args: args.to_vec(),
        elapsed_us,
        affected: reply.affected_count(),
    };
    logger.debug(&record.to_string(), &record.to_context());
    Ok(reply)
}

/// Logger writing to `tracing` at debug level under the `redis_facade::query` target.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingLogger {
    connection: String,
}

#[cfg(feature = "tracing")]
impl TracingLogger {
    #[must_use]
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
        }
    }

    #[must_use]
    pub fn connection(&self) -> &str {
        &self.connection
    }
}

#[cfg(feature = "tracing")]
impl Logger for TracingLogger {
    fn debug(&self, message: &str, context: &Map<String, JsonValue>) {
        let context = JsonValue::Object(context.clone());
        tracing::debug!(
            target: "redis_facade::query",
            connection = %self.connection,
            context = %context,
            "{message}"
        );
    }
}

/// Logger used when query logging is on and none was supplied.
///
/// # Errors
/// Returns `RedisFacadeError::MissingLogger` when the crate is built without a logging
/// backend.
#[allow(unused_variables)]
pub fn default_logger(connection: &str) -> Result<std::sync::Arc<dyn Logger>> {
    #[cfg(feature = "tracing")]
    {
        Ok(std::sync::Arc::new(TracingLogger::new(connection)))
    }
    #[cfg(not(feature = "tracing"))]
    {
        Err(crate::error::RedisFacadeError::MissingLogger(format!(
            "connection `{connection}` has no logger and the `tracing` feature is disabled"
        )))
    }
}
