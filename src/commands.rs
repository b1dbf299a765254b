//! Typed helpers over [`Connection::invoke`] for the most common commands.
//!
//! Each helper goes through `invoke`, so query logging applies to it the same way.

use crate::connection::Connection;
use crate::error::{RedisFacadeError, Result};
use crate::types::Value;

impl Connection {
    /// # Errors
    /// Returns the driver's error.
    pub fn ping(&mut self) -> Result<Value> {
        self.invoke("PING", &[])
    }

    /// Value stored at `key`, `Value::Nil` if absent.
    ///
    /// # Errors
    /// Returns the driver's error.
    pub fn get(&mut self, key: &str) -> Result<Value> {
        self.invoke("GET", &[Value::from(key)])
    }

    /// # Errors
    /// Returns the driver's error.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<Value> {
        self.invoke("SET", &[Value::from(key), value.into()])
    }

    /// Number of keys removed.
    ///
    /// # Errors
    /// Returns the driver's error, or `RedisFacadeError::CommandError` for a non-integer reply.
    pub fn del(&mut self, keys: &[&str]) -> Result<i64> {
        let args: Vec<Value> = keys.iter().map(|key| Value::from(*key)).collect();
        let reply = self.invoke("DEL", &args)?;
        integer_reply("DEL", &reply)
    }

    /// Whether `key` exists; integer and boolean replies are both understood.
    ///
    /// # Errors
    /// Returns the driver's error, or `RedisFacadeError::CommandError` for any other reply.
    pub fn exists(&mut self, key: &str) -> Result<bool> {
        match self.invoke("EXISTS", &[Value::from(key)])? {
            Value::Bool(found) => Ok(found),
            Value::Int(count) => Ok(count > 0),
            other => Err(unexpected("EXISTS", &other)),
        }
    }

    /// # Errors
    /// Returns the driver's error, or `RedisFacadeError::CommandError` for a non-integer reply.
    pub fn incr(&mut self, key: &str) -> Result<i64> {
        let reply = self.invoke("INCR", &[Value::from(key)])?;
        integer_reply("INCR", &reply)
    }

    /// # Errors
    /// Returns the driver's error, or `RedisFacadeError::CommandError` for a non-integer reply.
    pub fn incr_by(&mut self, key: &str, delta: i64) -> Result<i64> {
        let reply = self.invoke("INCRBY", &[Value::from(key), Value::Int(delta)])?;
        integer_reply("INCRBY", &reply)
    }

    /// # Errors
    /// Returns the driver's error.
    pub fn hget(&mut self, key: &str, field: &str) -> Result<Value> {
        self.invoke("HGET", &[Value::from(key), Value::from(field)])
    }

    /// # Errors
    /// Returns the driver's error.
    pub fn hset(&mut self, key: &str, field: &str, value: impl Into<Value>) -> Result<Value> {
        self.invoke("HSET", &[Value::from(key), Value::from(field), value.into()])
    }
}

fn integer_reply(command: &str, reply: &Value) -> Result<i64> {
    match reply {
        Value::Int(n) => Ok(*n),
        other => other.as_int().ok_or_else(|| unexpected(command, other)),
    }
}

fn unexpected(command: &str, reply: &Value) -> RedisFacadeError {
    RedisFacadeError::CommandError(format!("unexpected reply to {command}: {reply}"))
}
