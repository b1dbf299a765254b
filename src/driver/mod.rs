//! Driver capability and the bundled backends.

use std::any::Any;
use std::fmt::Debug;

use crate::config::DriverConfig;
use crate::error::Result;
use crate::types::Value;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod registry;

#[cfg(feature = "memory")]
pub use memory::MemoryDriver;
#[cfg(feature = "redis")]
pub use self::redis::RedisDriver;
pub use registry::{
    DRIVER_NAMESPACE, DriverFactory, DriverRegistry, register_driver, register_driver_fn,
};

/// Caller-supplied work run inside [`Driver::transaction`].
pub type TransactionBlock<'a> = &'a mut dyn FnMut(&mut dyn Driver) -> Result<()>;

/// A backend that can execute named commands.
///
/// The façade never enumerates commands: anything the backend understands can be sent
/// through [`Driver::invoke`], and typed helpers are layered on top of it.
pub trait Driver: Debug + Send + 'static {
    /// Fully-qualified type name under [`DRIVER_NAMESPACE`].
    fn type_name(&self) -> &'static str;

    /// Execute `command` with positional `args` and return the backend's reply.
    ///
    /// # Errors
    /// Returns whatever error the backend raises; callers receive it unchanged.
    fn invoke(&mut self, command: &str, args: &[Value]) -> Result<Value>;

    /// Run `block` inside a transactional scope.
    ///
    /// The reply is a `Value::Array` holding the replies of the commands issued inside
    /// the block. If the block fails, nothing it did is kept and its error is returned.
    ///
    /// # Errors
    /// Returns the block's error or a backend error raised while committing.
    fn transaction(&mut self, block: TransactionBlock<'_>) -> Result<Value>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Driver {
    /// Whether the driver is a `T`.
    #[must_use]
    pub fn is<T: Driver>(&self) -> bool {
        self.as_any().is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Driver>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Driver>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Drivers that can be built from pass-through configuration and registered by type.
pub trait FromConfig: Driver + Sized {
    /// Fully-qualified name the driver is registered under.
    const TYPE_NAME: &'static str;

    /// Build the driver from the connection's pass-through keys.
    ///
    /// # Errors
    /// Returns a configuration or backend error if the driver cannot be created.
    fn from_config(config: &DriverConfig) -> Result<Self>;
}
