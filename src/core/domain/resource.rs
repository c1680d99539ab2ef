use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::domain::context::Context;
use crate::core::domain::transaction::TransactionalResource;

/// Collapses key parts into the string a unit of work dedups on.
pub type KeyFormatter = Arc<dyn Fn(&[String]) -> String + Send + Sync>;

pub fn default_key_formatter(parts: &[String]) -> String {
    parts.join("/")
}

/// Identifies a resource by ordered parts, usually kind (`pg`, `redis`) and a
/// logical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    parts: Vec<String>,
}

impl ResourceKey {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parts: vec![kind.into(), name.into()],
        }
    }

    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn kind(&self) -> Option<&str> {
        self.parts.first().map(String::as_str)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&default_key_formatter(&self.parts))
    }
}

/// Pure lookup from key to resource. Must never start a transaction.
pub trait Resolver: Send + Sync {
    fn resolve(
        &self,
        ctx: &Context,
        key: &ResourceKey,
    ) -> Result<Arc<dyn TransactionalResource>, ResolveError>;
}

impl<F> Resolver for F
where
    F: Fn(&Context, &ResourceKey) -> Result<Arc<dyn TransactionalResource>, ResolveError>
        + Send
        + Sync,
{
    fn resolve(
        &self,
        ctx: &Context,
        key: &ResourceKey,
    ) -> Result<Arc<dyn TransactionalResource>, ResolveError> {
        self(ctx, key)
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Resource not found: {key}")]
    NotFound { key: String },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Resource already registered: {key}")]
    DuplicateKey { key: String },
}

/// Resolver backed by resources registered up front, before the registry is
/// shared with a manager.
pub struct ResourceRegistry {
    formatter: KeyFormatter,
    resources: HashMap<String, Arc<dyn TransactionalResource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::with_formatter(Arc::new(default_key_formatter))
    }

    pub fn with_formatter(formatter: KeyFormatter) -> Self {
        Self {
            formatter,
            resources: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        key: ResourceKey,
        resource: Arc<dyn TransactionalResource>,
    ) -> Result<(), RegistryError> {
        let formatted = (self.formatter)(key.parts());
        if self.resources.contains_key(&formatted) {
            return Err(RegistryError::DuplicateKey { key: formatted });
        }
        self.resources.insert(formatted, resource);
        Ok(())
    }

    /// Registers `resource` unless the key is taken; the first registration wins.
    pub fn register_if_absent(&mut self, key: ResourceKey, resource: Arc<dyn TransactionalResource>) {
        let formatted = (self.formatter)(key.parts());
        self.resources.entry(formatted).or_insert(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for ResourceRegistry {
    fn resolve(
        &self,
        _ctx: &Context,
        key: &ResourceKey,
    ) -> Result<Arc<dyn TransactionalResource>, ResolveError> {
        let formatted = (self.formatter)(key.parts());
        self.resources
            .get(&formatted)
            .cloned()
            .ok_or(ResolveError::NotFound { key: formatted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::transaction::TransactionOptions;
    use crate::core::testing::RecordingResource;

    #[test]
    fn default_formatter_joins_parts() {
        let key = ResourceKey::from_parts(["pg", "orders", "replica"]);
        assert_eq!(default_key_formatter(key.parts()), "pg/orders/replica");
        assert_eq!(key.to_string(), "pg/orders/replica");
        assert_eq!(key.kind(), Some("pg"));
    }

    #[test]
    fn register_rejects_duplicate_keys() {
        let mut registry = ResourceRegistry::new();
        registry
            .register(ResourceKey::new("pg", "default"), RecordingResource::new().into_arc())
            .unwrap();

        let err = registry
            .register(ResourceKey::new("pg", "default"), RecordingResource::new().into_arc())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateKey { key } if key == "pg/default"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn register_if_absent_keeps_first() {
        let first = RecordingResource::new();
        let second = RecordingResource::new();
        let mut registry = ResourceRegistry::new();
        registry.register_if_absent(ResourceKey::new("redis", "cache"), first.clone().into_arc());
        registry.register_if_absent(ResourceKey::new("redis", "cache"), second.clone().into_arc());
        assert_eq!(registry.len(), 1);

        let resolved = registry
            .resolve(&Context::new(), &ResourceKey::new("redis", "cache"))
            .ok()
            .unwrap();
        resolved
            .begin(&Context::new(), &TransactionOptions::default())
            .await
            .ok()
            .unwrap();
        assert_eq!(first.begins(), 1);
        assert_eq!(second.begins(), 0);
    }

    #[test]
    fn resolve_unknown_key_is_not_found() {
        let registry = ResourceRegistry::new();
        let err = registry
            .resolve(&Context::new(), &ResourceKey::new("pg", "missing"))
            .err()
            .unwrap();
        assert!(matches!(err, ResolveError::NotFound { key } if key == "pg/missing"));
    }

    #[test]
    fn custom_formatter_controls_dedup() {
        let formatter: KeyFormatter = Arc::new(|parts: &[String]| parts[0].clone());
        let mut registry = ResourceRegistry::with_formatter(formatter);
        registry
            .register(ResourceKey::new("pg", "a"), RecordingResource::new().into_arc())
            .unwrap();
        assert!(registry
            .register(ResourceKey::new("pg", "b"), RecordingResource::new().into_arc())
            .is_err());
    }

    #[test]
    fn closures_are_resolvers() {
        let resource = RecordingResource::new();
        let resolver = move |_: &Context, key: &ResourceKey| {
            if key.kind() == Some("pg") {
                Ok(resource.clone().into_arc())
            } else {
                Err(ResolveError::NotFound { key: key.to_string() })
            }
        };
        assert!(resolver.resolve(&Context::new(), &ResourceKey::new("pg", "x")).is_ok());
        assert!(resolver.resolve(&Context::new(), &ResourceKey::new("mq", "x")).is_err());
    }
}
