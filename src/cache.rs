use crate::types::Value;

/// Cache object a connection carries for its callers.
///
/// The connection only stores and hands back the reference; it never reads or
/// writes through it.
pub trait Cacher: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value);

    fn delete(&self, key: &str) -> bool;
}
