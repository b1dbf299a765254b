#![allow(dead_code)]

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use redis_facade::driver::TransactionBlock;
use redis_facade::prelude::*;
use serde_json::{Map, Value as JsonValue};

pub type Calls = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

/// Driver double replying from a script and remembering every call.
#[derive(Debug)]
pub struct StubDriver {
    pub version: &'static str,
    replies: HashMap<String, Value>,
    pub calls: Calls,
}

impl StubDriver {
    pub fn new(version: &'static str) -> Self {
        Self {
            version,
            replies: HashMap::new(),
            calls: Arc::default(),
        }
    }

    pub fn reply(mut self, command: &str, value: Value) -> Self {
        self.replies.insert(command.to_ascii_lowercase(), value);
        self
    }

    pub fn with_calls(mut self, calls: Calls) -> Self {
        self.calls = calls;
        self
    }
}

impl Driver for StubDriver {
    fn type_name(&self) -> &'static str {
        "tests/StubDriver"
    }

    fn invoke(&mut self, command: &str, args: &[Value]) -> Result<Value, RedisFacadeError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), args.to_vec()));
        self.replies
            .get(&command.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                RedisFacadeError::CommandError(format!("{} cannot {command}", self.version))
            })
    }

    fn transaction(&mut self, block: TransactionBlock<'_>) -> Result<Value, RedisFacadeError> {
        block(self)?;
        Ok(Value::Array(Vec::new()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub type Entries = Arc<Mutex<Vec<(String, Map<String, JsonValue>)>>>;

/// Logger double keeping every entry.
#[derive(Default, Clone)]
pub struct RecordingLogger {
    pub entries: Entries,
}

impl RecordingLogger {
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn entry(&self, idx: usize) -> (String, Map<String, JsonValue>) {
        self.entries.lock().unwrap()[idx].clone()
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str, context: &Map<String, JsonValue>) {
        self.entries
            .lock()
            .unwrap()
            .push((message.to_string(), context.clone()));
    }
}

/// Registry whose `redis` alias builds `StubDriver`s from `make`.
pub fn stub_registry<F>(make: F) -> DriverRegistry
where
    F: Fn() -> StubDriver + Send + Sync + 'static,
{
    let mut registry = DriverRegistry::new();
    registry
        .register("redis", move |_| Ok(Box::new(make()) as Box<dyn Driver>))
        .unwrap();
    registry
}
