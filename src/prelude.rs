//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::cache::Cacher;
pub use crate::config::{ConnectionOptions, ConnectionOptionsBuilder, DriverConfig};
pub use crate::connection::Connection;
pub use crate::driver::{
    DRIVER_NAMESPACE, Driver, DriverRegistry, FromConfig, register_driver, register_driver_fn,
};
pub use crate::error::RedisFacadeError;
pub use crate::logging::{CommandRecord, Logger};
pub use crate::types::{DriverKind, Value};

#[cfg(feature = "tracing")]
pub use crate::logging::TracingLogger;

#[cfg(feature = "memory")]
pub use crate::driver::MemoryDriver;
#[cfg(feature = "redis")]
pub use crate::driver::RedisDriver;
