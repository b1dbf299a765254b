//! Driver resolution: aliases, namespace promotion and the constructor table.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex::Regex;

use super::{Driver, FromConfig};
use crate::config::DriverConfig;
use crate::error::{RedisFacadeError, Result};
use crate::types::DriverKind;

/// Namespace short type names are promoted into.
pub const DRIVER_NAMESPACE: &str = "Redis/Driver";

/// Constructor stored in the registry.
pub type DriverFactory = Arc<dyn Fn(&DriverConfig) -> Result<Box<dyn Driver>> + Send + Sync>;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(::|\\|/)+").expect("valid separator pattern"));

static QUALIFIED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(/[A-Za-z_][A-Za-z0-9_]*)*$").expect("valid name pattern")
});

static GLOBAL_REGISTRY: LazyLock<RwLock<DriverRegistry>> =
    LazyLock::new(|| RwLock::new(DriverRegistry::with_builtins()));

/// Maps fully-qualified driver names to constructors.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("DriverRegistry")
            .field("drivers", &names)
            .finish()
    }
}

impl DriverRegistry {
    /// An empty registry; nothing resolves until drivers are registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every backend compiled into this build.
    #[must_use]
    pub fn with_builtins() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "redis")]
        registry.register_type::<super::RedisDriver>();
        #[cfg(feature = "memory")]
        registry.register_type::<super::MemoryDriver>();
        registry
    }

    /// A snapshot of the process-wide registry.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a constructor under `name`; short names are promoted into the namespace.
    ///
    /// Re-registering a name replaces the earlier constructor.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::ConfigError` if `name` is not a valid type name.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(&DriverConfig) -> Result<Box<dyn Driver>> + Send + Sync + 'static,
    {
        let qualified = qualify(name).ok_or_else(|| {
            RedisFacadeError::ConfigError(format!("`{name}` is not a valid driver type name"))
        })?;
        self.factories.insert(qualified, Arc::new(factory));
        Ok(())
    }

    /// Register a driver type under its [`FromConfig::TYPE_NAME`].
    pub fn register_type<D: FromConfig>(&mut self) {
        let factory: DriverFactory = Arc::new(|config: &DriverConfig| {
            D::from_config(config).map(|driver| Box::new(driver) as Box<dyn Driver>)
        });
        let name = qualify(D::TYPE_NAME).unwrap_or_else(|| D::TYPE_NAME.to_string());
        self.factories.insert(name, factory);
    }

    /// Fully-qualified name `identifier` resolves to, if any driver is registered there.
    #[must_use]
    pub fn lookup(&self, identifier: &str) -> Option<&str> {
        let qualified = qualify(identifier)?;
        self.factories
            .get_key_value(&qualified)
            .map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.lookup(identifier).is_some()
    }

    /// Resolve `identifier` and construct the driver with `config`.
    ///
    /// # Errors
    /// Returns `RedisFacadeError::MissingDriver` carrying `identifier` if nothing is
    /// registered for it; constructor errors are returned as they are.
    pub fn build(&self, identifier: &str, config: &DriverConfig) -> Result<Box<dyn Driver>> {
        let factory = qualify(identifier)
            .and_then(|qualified| self.factories.get(&qualified))
            .ok_or_else(|| RedisFacadeError::missing_driver(identifier))?;
        factory(config)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Register a driver type in the process-wide registry.
pub fn register_driver<D: FromConfig>() {
    GLOBAL_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register_type::<D>();
}

/// Register a constructor function in the process-wide registry.
///
/// # Errors
/// Returns `RedisFacadeError::ConfigError` if `name` is not a valid type name.
pub fn register_driver_fn<F>(name: &str, factory: F) -> Result<()>
where
    F: Fn(&DriverConfig) -> Result<Box<dyn Driver>> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(name, factory)
}

/// Turn an identifier into a fully-qualified name.
///
/// Reserved aliases map to the bundled backends, `::` and `\` separators become `/`,
/// and names without a separator are promoted under [`DRIVER_NAMESPACE`].
fn qualify(identifier: &str) -> Option<String> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return None;
    }
    for kind in [DriverKind::Redis, DriverKind::Memory] {
        if identifier.eq_ignore_ascii_case(kind.alias()) {
            return Some(kind.type_name().to_string());
        }
    }
    let normalized = SEPARATORS.replace_all(identifier, "/");
    let normalized = normalized.trim_matches('/');
    if !QUALIFIED_NAME.is_match(normalized) {
        return None;
    }
    if normalized.contains('/') {
        Some(normalized.to_string())
    } else {
        Some(format!("{DRIVER_NAMESPACE}/{normalized}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_case_insensitive() {
        assert_eq!(qualify("redis").as_deref(), Some("Redis/Driver/Redis"));
        assert_eq!(qualify("MEMORY").as_deref(), Some("Redis/Driver/Memory"));
    }

    #[test]
    fn short_names_are_promoted() {
        assert_eq!(qualify("Sentinel").as_deref(), Some("Redis/Driver/Sentinel"));
        assert_eq!(
            qualify("app::drivers::Fake").as_deref(),
            Some("app/drivers/Fake")
        );
        assert_eq!(
            qualify(r"\Redis\Driver\Memory").as_deref(),
            Some("Redis/Driver/Memory")
        );
    }

    #[test]
    fn malformed_names_do_not_qualify() {
        assert_eq!(qualify(""), None);
        assert_eq!(qualify("   "), None);
        assert_eq!(qualify("9lives"), None);
        assert_eq!(qualify("has space"), None);
    }

    #[test]
    fn empty_registry_reports_missing_driver() {
        let registry = DriverRegistry::new();
        let err = registry
            .build("memory", &DriverConfig::default())
            .unwrap_err();
        assert!(
            matches!(err, RedisFacadeError::MissingDriver { ref identifier } if identifier == "memory")
        );
    }

    #[test]
    fn register_rejects_invalid_names() {
        let mut registry = DriverRegistry::new();
        let result = registry.register("not valid", |_| {
            Err(RedisFacadeError::Other("unused".into()))
        });
        assert!(matches!(result, Err(RedisFacadeError::ConfigError(_))));
        assert!(registry.is_empty());
    }
}
