use clap::Parser;
use redis_facade::{ConnectionOptions, DriverKind, RedisFacadeError, Value};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send commands through a redis-facade connection")]
pub(crate) struct Args {
    #[arg(long, value_enum, default_value = "redis")]
    pub(crate) driver: DriverKind,
    /// Server URL, e.g. redis://127.0.0.1:6379/0. Overrides --host/--port/--database.
    #[arg(long)]
    pub(crate) url: Option<String>,
    #[arg(long)]
    pub(crate) host: Option<String>,
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[arg(long)]
    pub(crate) database: Option<u64>,
    /// Connect timeout in seconds.
    #[arg(long)]
    pub(crate) timeout: Option<f64>,
    /// Extra driver options as a JSON object.
    #[arg(long, value_name = "JSON")]
    pub(crate) options: Option<String>,
    #[arg(long, default_value = "cli")]
    pub(crate) name: String,
    /// Log every command with its timing and affected count.
    #[arg(long)]
    pub(crate) log_queries: bool,
    /// Also write log output to this file.
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    /// Run all commands in one transaction.
    #[arg(long)]
    pub(crate) transaction: bool,
    /// Command and arguments. Without one, commands are read from stdin, one per line.
    #[arg(trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CliConfig {
    pub(crate) driver: &'static str,
    pub(crate) name: String,
    pub(crate) log_queries: bool,
    pub(crate) log: Option<PathBuf>,
    pub(crate) transaction: bool,
    pub(crate) driver_options: Map<String, JsonValue>,
    pub(crate) command: Vec<String>,
}

impl CliConfig {
    pub(crate) fn from_args(args: Args) -> Result<Self, RedisFacadeError> {
        let mut driver_options = match args.options.as_deref() {
            Some(text) => match serde_json::from_str::<JsonValue>(text)? {
                JsonValue::Object(map) => map,
                other => {
                    return Err(RedisFacadeError::ConfigError(format!(
                        "--options must be a JSON object, got `{other}`"
                    )));
                }
            },
            None => Map::new(),
        };
        if let Some(url) = args.url {
            driver_options.insert("url".into(), url.into());
        }
        if let Some(host) = args.host {
            driver_options.insert("host".into(), host.into());
        }
        if let Some(port) = args.port {
            driver_options.insert("port".into(), port.into());
        }
        if let Some(database) = args.database {
            driver_options.insert("database".into(), database.into());
        }
        if let Some(timeout) = args.timeout {
            driver_options.insert("timeout".into(), timeout.into());
        }

        Ok(CliConfig {
            driver: args.driver.alias(),
            name: args.name,
            log_queries: args.log_queries,
            log: args.log,
            transaction: args.transaction,
            driver_options,
            command: args.command,
        })
    }

    pub(crate) fn connection_options(&self) -> ConnectionOptions {
        let mut builder = ConnectionOptions::builder()
            .driver(self.driver)
            .name(self.name.clone())
            .log(self.log_queries);
        for (key, value) in &self.driver_options {
            builder = builder.option(key.clone(), value.clone());
        }
        builder.finish()
    }
}

/// Split one input line into a command and its arguments.
///
/// Double quotes group words; there are no escapes. Blank lines and lines starting
/// with `#` yield nothing.
pub(crate) fn parse_line(line: &str) -> Option<(String, Vec<Value>)> {
    if line.trim_start().starts_with('#') {
        return None;
    }
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        words.push(current);
    }
    let mut words = words.into_iter();
    let command = words.next()?;
    Some((command, words.map(Value::from).collect()))
}
