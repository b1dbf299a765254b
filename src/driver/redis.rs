use std::any::Any;
use std::fmt;
use std::time::Duration;

use ::redis::{
    Client, Cmd, Connection as RedisConnection, ConnectionAddr, ConnectionInfo,
    IntoConnectionInfo, RedisConnectionInfo, Value as RedisValue,
};

use super::{Driver, FromConfig, TransactionBlock};
use crate::config::DriverConfig;
use crate::error::{RedisFacadeError, Result};
use crate::types::{DriverKind, Value};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 6379;

/// Driver speaking to a Redis server over one blocking connection.
///
/// Pass-through options: `url`, or `host`, `port`, `database`, `username`, `password`;
/// plus `timeout` (connect, seconds) and `read_timeout` (seconds).
pub struct RedisDriver {
    conn: RedisConnection,
    target: String,
    in_multi: bool,
}

// Manual Debug implementation because `redis::Connection` does not expose `Debug`
impl fmt::Debug for RedisDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisDriver")
            .field("target", &self.target)
            .field("in_multi", &self.in_multi)
            .finish_non_exhaustive()
    }
}

impl RedisDriver {
    /// Open a connection described by `info`.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::RedisError` if the server cannot be reached.
    pub fn connect(info: ConnectionInfo, timeout: Option<Duration>) -> Result<Self> {
        let target = describe(&info.addr);
        let client = Client::open(info)?;
        let conn = match timeout {
            Some(timeout) => client.get_connection_with_timeout(timeout)?,
            None => client.get_connection()?,
        };
        Ok(Self::from_connection(conn, target))
    }

    /// Wrap an already established connection.
    #[must_use]
    pub fn from_connection(conn: RedisConnection, target: String) -> Self {
        Self {
            conn,
            target,
            in_multi: false,
        }
    }

    /// `host:port` (or socket path) this driver talks to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn connection_mut(&mut self) -> &mut RedisConnection {
        &mut self.conn
    }
}

impl Driver for RedisDriver {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn invoke(&mut self, command: &str, args: &[Value]) -> Result<Value> {
        let mut cmd = ::redis::cmd(command);
        for arg in args {
            push_arg(&mut cmd, arg);
        }
        let reply: RedisValue = cmd.query(&mut self.conn)?;
        Ok(from_redis_value(reply))
    }

    fn transaction(&mut self, block: TransactionBlock<'_>) -> Result<Value> {
        if self.in_multi {
            return Err(RedisFacadeError::CommandError(
                "ERR MULTI calls can not be nested".into(),
            ));
        }
        ::redis::cmd("MULTI").query::<()>(&mut self.conn)?;
        self.in_multi = true;
        let outcome = block(self);
        self.in_multi = false;
        match outcome {
            Ok(()) => {
                let reply: RedisValue = ::redis::cmd("EXEC").query(&mut self.conn)?;
                Ok(from_redis_value(reply))
            }
            Err(err) => {
                // the block's error wins over a failed DISCARD
                let _ = ::redis::cmd("DISCARD").query::<()>(&mut self.conn);
                Err(err)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl FromConfig for RedisDriver {
    const TYPE_NAME: &'static str = DriverKind::Redis.type_name();

    fn from_config(config: &DriverConfig) -> Result<Self> {
        let info = connection_info(config)?;
        let timeout = duration(config, "timeout")?;
        let mut driver = Self::connect(info, timeout)?;
        if let Some(read_timeout) = duration(config, "read_timeout")? {
            driver.conn.set_read_timeout(Some(read_timeout))?;
        }
        Ok(driver)
    }
}

/// Build connection parameters from pass-through options.
///
/// # Errors
/// Returns `RedisFacadeError::ConfigError` for malformed option values and
/// `RedisFacadeError::RedisError` for an unparsable `url`.
pub fn connection_info(config: &DriverConfig) -> Result<ConnectionInfo> {
    if let Some(url) = config.string("url")? {
        return Ok(url.as_str().into_connection_info()?);
    }
    let host = config
        .string("host")?
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match config.u64("port")? {
        Some(port) => u16::try_from(port).map_err(|_| {
            RedisFacadeError::ConfigError(format!("option `port` out of range: {port}"))
        })?,
        None => DEFAULT_PORT,
    };
    let db = match config.u64("database")? {
        Some(db) => i64::try_from(db).map_err(|_| {
            RedisFacadeError::ConfigError(format!("option `database` out of range: {db}"))
        })?,
        None => 0,
    };
    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis: RedisConnectionInfo {
            db,
            username: config.string("username")?,
            password: config.string("password")?,
            ..Default::default()
        },
    })
}

fn describe(addr: &ConnectionAddr) -> String {
    match addr {
        ConnectionAddr::Tcp(host, port) => format!("{host}:{port}"),
        other => format!("{other:?}"),
    }
}

fn duration(config: &DriverConfig, key: &str) -> Result<Option<Duration>> {
    match config.f64(key)? {
        None => Ok(None),
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
        Some(secs) => Err(RedisFacadeError::ConfigError(format!(
            "option `{key}` must be a positive number of seconds, got {secs}"
        ))),
    }
}

fn push_arg(cmd: &mut Cmd, arg: &Value) {
    match arg {
        Value::Nil => {
            cmd.arg("");
        }
        Value::Bool(flag) => {
            cmd.arg(i64::from(*flag));
        }
        Value::Int(n) => {
            cmd.arg(*n);
        }
        Value::Float(n) => {
            cmd.arg(*n);
        }
        Value::Text(text) => {
            cmd.arg(text.as_str());
        }
        Value::Bytes(bytes) => {
            cmd.arg(bytes.as_slice());
        }
        Value::Array(items) => {
            for item in items {
                push_arg(cmd, item);
            }
        }
    }
}

fn from_redis_value(value: RedisValue) -> Value {
    match value {
        RedisValue::Nil => Value::Nil,
        RedisValue::Int(n) => Value::Int(n),
        RedisValue::BulkString(bytes) => Value::from(bytes),
        RedisValue::SimpleString(text) => Value::Text(text),
        RedisValue::Okay => Value::from("OK"),
        RedisValue::Array(items) | RedisValue::Set(items) => {
            Value::Array(items.into_iter().map(from_redis_value).collect())
        }
        RedisValue::Map(pairs) => Value::Array(
            pairs
                .into_iter()
                .flat_map(|(k, v)| [from_redis_value(k), from_redis_value(v)])
                .collect(),
        ),
        RedisValue::Double(n) => Value::Float(n),
        RedisValue::Boolean(flag) => Value::Bool(flag),
        RedisValue::VerbatimString { text, .. } => Value::Text(text),
        RedisValue::Attribute { data, .. } => from_redis_value(*data),
        RedisValue::Push { data, .. } => {
            Value::Array(data.into_iter().map(from_redis_value).collect())
        }
        #[allow(unreachable_patterns)]
        other => Value::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> DriverConfig {
        DriverConfig::new(value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn defaults_point_at_localhost() {
        let info = connection_info(&DriverConfig::default()).unwrap();
        assert!(matches!(info.addr, ConnectionAddr::Tcp(ref host, 6379) if host == "127.0.0.1"));
        assert_eq!(info.redis.db, 0);
        assert_eq!(info.redis.password, None);
    }

    #[test]
    fn explicit_options_are_used() {
        let info = connection_info(&config(json!({
            "host": "cache.internal",
            "port": 6380,
            "database": "2",
            "password": "s3cret",
        })))
        .unwrap();
        assert!(
            matches!(info.addr, ConnectionAddr::Tcp(ref host, 6380) if host == "cache.internal")
        );
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn url_overrides_host_and_port() {
        let info = connection_info(&config(json!({
            "url": "redis://10.1.2.3:7000/4",
            "host": "ignored",
        })))
        .unwrap();
        assert!(matches!(info.addr, ConnectionAddr::Tcp(ref host, 7000) if host == "10.1.2.3"));
        assert_eq!(info.redis.db, 4);
    }

    #[test]
    fn bad_options_are_config_errors() {
        assert!(matches!(
            connection_info(&config(json!({"port": 70000}))),
            Err(RedisFacadeError::ConfigError(_))
        ));
        assert!(matches!(
            duration(&config(json!({"timeout": -1})), "timeout"),
            Err(RedisFacadeError::ConfigError(_))
        ));
    }

    #[test]
    fn replies_map_onto_values() {
        assert_eq!(from_redis_value(RedisValue::Okay), Value::from("OK"));
        assert_eq!(
            from_redis_value(RedisValue::BulkString(b"v1".to_vec())),
            Value::from("v1")
        );
        assert_eq!(
            from_redis_value(RedisValue::Array(vec![
                RedisValue::Int(1),
                RedisValue::Nil,
                RedisValue::Boolean(false),
            ])),
            Value::Array(vec![Value::Int(1), Value::Nil, Value::Bool(false)])
        );
        assert_eq!(
            from_redis_value(RedisValue::Map(vec![(
                RedisValue::SimpleString("f".into()),
                RedisValue::Int(2),
            )])),
            Value::Array(vec![Value::from("f"), Value::Int(2)])
        );
    }

    #[test]
    fn arguments_flatten_arrays() {
        let mut cmd = ::redis::cmd("MSET");
        push_arg(
            &mut cmd,
            &Value::Array(vec![Value::from("a"), Value::Int(1), Value::Bool(true)]),
        );
        let packed = String::from_utf8(cmd.get_packed_command()).unwrap();
        assert!(packed.starts_with("*4\r\n"));
        assert!(packed.ends_with("$1\r\na\r\n$1\r\n1\r\n$1\r\n1\r\n"));
    }
}
