//! A connection façade for Redis-style key-value stores.
//!
//! A [`Connection`] owns one driver, picked by name from a registry, and forwards any
//! named command to it. With query logging on, each command is timed and recorded.

pub mod cache;
pub mod commands;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod logging;
pub mod prelude;
pub mod types;

pub use cache::Cacher;
pub use config::{ConnectionOptions, ConnectionOptionsBuilder, DriverConfig};
pub use connection::Connection;
pub use driver::{Driver, DriverRegistry, FromConfig};
pub use error::{RedisFacadeError, Result};
pub use logging::{CommandRecord, Logger};
pub use types::{DriverKind, Value};
