//! Provider capability and per-walk handle cache.
//!
//! The plugin transport lives outside this crate. A `ProviderFactory` turns a
//! provider configuration address into a live `Provider` handle; the
//! `ProviderCache` makes sure that happens at most once per address per walk,
//! even when many nodes ask for the same provider at the same time.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use terrawalk_core::{AbsProviderConfig, Error, Resource, ResourceMode, Result};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Schema for one resource type.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSchema {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub attributes: BTreeSet<String>,
}

/// Everything a provider can manage or read, keyed by resource type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProviderSchema {
    #[serde(default)]
    pub managed: BTreeMap<String, ResourceSchema>,
    #[serde(default)]
    pub data: BTreeMap<String, ResourceSchema>,
}

impl ProviderSchema {
    pub fn with_managed(mut self, type_name: impl Into<String>, schema: ResourceSchema) -> Self {
        self.managed.insert(type_name.into(), schema);
        self
    }

    pub fn with_data(mut self, type_name: impl Into<String>, schema: ResourceSchema) -> Self {
        self.data.insert(type_name.into(), schema);
        self
    }

    pub fn schema_for(&self, resource: &Resource) -> Option<&ResourceSchema> {
        match resource.mode {
            ResourceMode::Managed => self.managed.get(&resource.type_name),
            ResourceMode::Data => self.data.get(&resource.type_name),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ApplyResourceChangeRequest {
    pub type_name: String,
    pub prior: Value,
    pub planned: Value,
    pub config: Value,
}

/// A live handle to one configured backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Fetch the provider's schema. Called once per walk by the cache.
    async fn schema(&self) -> Result<ProviderSchema>;

    /// Make the real-world object match `planned`. Returns the new value;
    /// `Value::Null` means the object no longer exists.
    async fn apply_resource_change(&self, request: ApplyResourceChangeRequest) -> Result<Value>;
}

/// Starts provider instances. Implemented by whatever transport hosts them.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn init(&self, addr: &AbsProviderConfig) -> Result<Arc<dyn Provider>>;
}

/// A provider that has been started and whose schema is known.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub addr: AbsProviderConfig,
    pub handle: Arc<dyn Provider>,
    pub schema: Arc<ProviderSchema>,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("addr", &self.addr)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Resolve-or-fetch cache of provider handles for one walk.
pub struct ProviderCache {
    factory: Arc<dyn ProviderFactory>,
    slots: DashMap<AbsProviderConfig, Arc<OnceCell<ResolvedProvider>>>,
}

impl ProviderCache {
    pub fn new(factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            factory,
            slots: DashMap::new(),
        }
    }

    /// Return the handle for `addr`, starting the provider and fetching its
    /// schema on first use. Concurrent callers for the same address wait on
    /// one initialization; failures are not cached.
    pub async fn resolve(&self, addr: &AbsProviderConfig) -> Result<ResolvedProvider> {
        let slot = self.slots.entry(addr.clone()).or_default().clone();
        let resolved = slot
            .get_or_try_init(|| async {
                debug!(provider = %addr, "initializing provider");
                let handle = self.factory.init(addr).await?;
                let schema = handle
                    .schema()
                    .await
                    .map_err(|e| Error::schema_fetch(addr, e.to_string()))?;
                info!(
                    provider = %addr,
                    managed = schema.managed.len(),
                    data = schema.data.len(),
                    "provider ready"
                );
                Ok::<_, Error>(ResolvedProvider {
                    addr: addr.clone(),
                    handle,
                    schema: Arc::new(schema),
                })
            })
            .await?;
        Ok(resolved.clone())
    }

    pub fn is_initialized(&self, addr: &AbsProviderConfig) -> bool {
        self.slots
            .get(addr)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    /// Number of providers successfully initialized so far.
    pub fn initialized_count(&self) -> usize {
        self.slots.iter().filter(|s| s.value().initialized()).count()
    }
}

/// Schema-only provider: knows which types it serves but cannot change
/// real-world objects. Enough for walks that only touch state.
pub struct StaticProvider {
    source: String,
    schema: ProviderSchema,
}

impl StaticProvider {
    pub fn new(source: impl Into<String>, schema: ProviderSchema) -> Self {
        Self {
            source: source.into(),
            schema,
        }
    }
}

#[async_trait]
impl Provider for StaticProvider {
    async fn schema(&self) -> Result<ProviderSchema> {
        Ok(self.schema.clone())
    }

    async fn apply_resource_change(&self, request: ApplyResourceChangeRequest) -> Result<Value> {
        Err(Error::provider_unavailable(
            &self.source,
            format!(
                "schema-only provider cannot apply changes to {}",
                request.type_name
            ),
        ))
    }
}

/// Factory serving `StaticProvider`s keyed by normalized source address.
#[derive(Default)]
pub struct StaticProviderFactory {
    schemas: HashMap<String, ProviderSchema>,
}

impl StaticProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema. Replaces any existing entry for the same source.
    pub fn register(&mut self, source: &str, schema: ProviderSchema) {
        let source = terrawalk_core::normalize_provider_source(source);
        self.schemas.insert(source, schema);
    }

    pub fn sources(&self) -> Vec<&str> {
        self.schemas.keys().map(|s| s.as_str()).collect()
    }
}

#[async_trait]
impl ProviderFactory for StaticProviderFactory {
    async fn init(&self, addr: &AbsProviderConfig) -> Result<Arc<dyn Provider>> {
        match self.schemas.get(&addr.source) {
            Some(schema) => Ok(Arc::new(StaticProvider::new(&addr.source, schema.clone()))),
            None => Err(Error::provider_unavailable(addr, "no provider registered for source")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_factory_serves_registered_sources() {
        let mut factory = StaticProviderFactory::new();
        factory.register(
            "hashicorp/aws",
            ProviderSchema::default().with_managed("aws_instance", ResourceSchema::default()),
        );
        let cache = ProviderCache::new(Arc::new(factory));

        let aws = AbsProviderConfig::new("aws");
        let resolved = cache.resolve(&aws).await.unwrap();
        assert!(resolved
            .schema
            .schema_for(&Resource::managed("aws_instance", "x"))
            .is_some());
        assert!(cache.is_initialized(&aws));

        let missing = AbsProviderConfig::new("google");
        let err = cache.resolve(&missing).await.unwrap_err();
        assert!(err.to_string().contains("not available"));
        assert!(!cache.is_initialized(&missing));
        assert_eq!(cache.initialized_count(), 1);
    }
}
