//! The connection façade: driver resolution plus command dispatch.

use std::fmt;
use std::sync::Arc;

use crate::cache::Cacher;
use crate::config::{ConnectionOptions, ConnectionOptionsBuilder};
use crate::driver::{Driver, DriverRegistry, TransactionBlock};
use crate::error::{RedisFacadeError, Result};
use crate::logging::{self, Logger};
use crate::types::Value;

/// Logger used for query logging.
#[derive(Clone, Default)]
enum LoggerSlot {
    #[default]
    Unset,
    /// Built lazily from the connection name.
    Default(Arc<dyn Logger>),
    /// Supplied by the caller.
    Explicit(Arc<dyn Logger>),
}

impl LoggerSlot {
    fn state(&self) -> &'static str {
        match self {
            LoggerSlot::Unset => "unset",
            LoggerSlot::Default(_) => "default",
            LoggerSlot::Explicit(_) => "explicit",
        }
    }
}

/// One logical connection to a key-value backend.
///
/// Commands go through [`Connection::invoke`], which forwards them to the active
/// driver and, when query logging is on, records each one.
///
/// # Examples
/// ```rust,no_run
/// use redis_facade::prelude::*;
///
/// # fn demo() -> Result<(), RedisFacadeError> {
/// let mut conn = ConnectionOptions::builder()
///     .driver("memory")
///     .name("sessions")
///     .log(true)
///     .build();
/// conn.invoke("SET", &["k".into(), "v1".into()])?;
/// assert_eq!(conn.invoke("GET", &["k".into()])?, Value::from("v1"));
/// # Ok(()) }
/// ```
pub struct Connection {
    options: ConnectionOptions,
    registry: Option<DriverRegistry>,
    /// `None` until a driver is resolved or set.
    driver: Option<Box<dyn Driver>>,
    log_queries: bool,
    logger: LoggerSlot,
    cacher: Option<Arc<dyn Cacher>>,
}

// Manual Debug implementation because loggers and cachers are opaque trait objects
impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("options", &self.options)
            .field("driver", &self.driver)
            .field("log_queries", &self.log_queries)
            .field("logger", &self.logger.state())
            .field("cacher", &self.cacher.is_some())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a connection; the driver is resolved on first use.
    #[must_use]
    pub fn new(options: ConnectionOptions) -> Self {
        let log_queries = options.log_enabled();
        Self {
            options,
            registry: None,
            driver: None,
            log_queries,
            logger: LoggerSlot::Unset,
            cacher: None,
        }
    }

    /// Create a connection resolving drivers through `registry` instead of the
    /// process-wide one.
    #[must_use]
    pub fn with_registry(options: ConnectionOptions, registry: DriverRegistry) -> Self {
        let mut conn = Self::new(options);
        conn.registry = Some(registry);
        conn
    }

    #[must_use]
    pub fn builder() -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder::new()
    }

    /// Logical connection name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.options.name()
    }

    #[must_use]
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// The held driver.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::DriverUnresolved` if no driver was ever resolved or set.
    pub fn driver(&mut self) -> Result<&mut dyn Driver> {
        self.driver
            .as_deref_mut()
            .ok_or(RedisFacadeError::DriverUnresolved)
    }

    #[must_use]
    pub fn has_driver(&self) -> bool {
        self.driver.is_some()
    }

    /// Resolve `identifier` with this connection's driver options and make the result the
    /// active driver. Any previously held driver is dropped.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::MissingDriver` if `identifier` does not name a
    /// registered driver, or the constructor's error if building it fails. The held
    /// driver is left untouched on failure.
    pub fn resolve_driver(&mut self, identifier: &str) -> Result<&mut dyn Driver> {
        let config = self.options.driver_config();
        let driver = match &self.registry {
            Some(registry) => registry.build(identifier, &config)?,
            None => DriverRegistry::global().build(identifier, &config)?,
        };
        Ok(self.set_driver(driver))
    }

    /// Use an already constructed driver as is, replacing any held one.
    pub fn set_driver(&mut self, driver: Box<dyn Driver>) -> &mut dyn Driver {
        self.driver.insert(driver).as_mut()
    }

    /// Drop the held driver and return it, leaving the connection unresolved.
    pub fn take_driver(&mut self) -> Option<Box<dyn Driver>> {
        self.driver.take()
    }

    /// The held driver, resolving the configured one if none is held yet.
    fn active_driver(&mut self) -> Result<&mut dyn Driver> {
        if !self.has_driver() {
            let identifier = self.options.driver();
            self.resolve_driver(&identifier)?;
        }
        self.driver()
    }

    /// Send `command` with positional `args` to the active driver.
    ///
    /// The driver's reply is returned unchanged. With query logging on, one
    /// [`logging::CommandRecord`] is emitted per successful call.
    ///
    /// # Errors
    /// Returns resolution errors if no driver is held and the configured one cannot be
    /// built, `RedisFacadeError::MissingLogger` if logging is on without any logger, and
    /// otherwise whatever error the driver raises.
    pub fn invoke(&mut self, command: &str, args: &[Value]) -> Result<Value> {
        let logger = if self.log_queries {
            Some(self.logger()?)
        } else {
            None
        };
        let driver = self.active_driver()?;
        let mut call = |args: &[Value]| driver.invoke(command, args);
        match logger {
            Some(logger) => logging::record_command(logger.as_ref(), command, args, call),
            None => call(args),
        }
    }

    /// Run `block` inside the driver's transactional scope.
    ///
    /// Commands issued on the driver handed to `block` are not query-logged.
    ///
    /// # Errors
    /// Returns resolution errors, the block's error, or a backend error.
    pub fn transaction<F>(&mut self, mut block: F) -> Result<Value>
    where
        F: FnMut(&mut dyn Driver) -> Result<()>,
    {
        let block: TransactionBlock<'_> = &mut block;
        self.active_driver()?.transaction(block)
    }

    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.log_queries
    }

    pub fn set_logging(&mut self, enabled: bool) {
        self.log_queries = enabled;
    }

    /// The query logger, creating the default one bound to this connection's name on
    /// first use.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::MissingLogger` if no logger was set and no logging
    /// backend is compiled in.
    pub fn logger(&mut self) -> Result<Arc<dyn Logger>> {
        match &self.logger {
            LoggerSlot::Explicit(logger) | LoggerSlot::Default(logger) => Ok(Arc::clone(logger)),
            LoggerSlot::Unset => {
                let logger = logging::default_logger(self.options.name())?;
                self.logger = LoggerSlot::Default(Arc::clone(&logger));
                Ok(logger)
            }
        }
    }

    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = LoggerSlot::Explicit(logger);
    }

    #[must_use]
    pub fn cacher(&self) -> Option<Arc<dyn Cacher>> {
        self.cacher.clone()
    }

    pub fn set_cacher(&mut self, cacher: Arc<dyn Cacher>) {
        self.cacher = Some(cacher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getter_fails_before_resolution() {
        let mut conn = Connection::new(ConnectionOptions::new());
        assert!(matches!(conn.driver(), Err(RedisFacadeError::DriverUnresolved)));
        assert!(conn.take_driver().is_none());
    }

    #[cfg(feature = "memory")]
    #[test]
    fn set_driver_hands_back_the_held_driver() {
        use crate::driver::MemoryDriver;

        let mut conn = Connection::new(ConnectionOptions::new());
        let set: *const MemoryDriver = conn
            .set_driver(Box::new(MemoryDriver::new()))
            .downcast_ref::<MemoryDriver>()
            .unwrap();
        let held = conn.driver().unwrap().downcast_ref::<MemoryDriver>().unwrap();
        assert!(std::ptr::eq(set, held));

        conn.set_driver(Box::new(MemoryDriver::new()));
        assert!(conn.take_driver().is_some());
        assert!(!conn.has_driver());
    }

    #[test]
    fn empty_registry_reports_configured_identifier() {
        let options = ConnectionOptions::builder().driver("nosuch").finish();
        let mut conn = Connection::with_registry(options, DriverRegistry::new());
        let err = conn.invoke("PING", &[]).unwrap_err();
        assert!(
            matches!(err, RedisFacadeError::MissingDriver { ref identifier } if identifier == "nosuch")
        );
        assert!(!conn.has_driver());
    }

    #[test]
    fn logging_flag_follows_options() {
        let conn = ConnectionOptions::builder().log(true).build();
        assert!(conn.logging_enabled());
        let debug = format!("{conn:?}");
        assert!(debug.contains("logger: \"unset\""));
    }
}
