//! Provider Registry
//!
//! Maps provider names to their stores, in registration order.

use std::sync::Arc;

use super::{InMemoryProviderStore, LatestByTypeSource, ProviderName, ProviderStore};
use crate::error::{GatewayError, Result};

struct Registration {
    name: ProviderName,
    store: Arc<dyn ProviderStore>,
    source: Arc<dyn LatestByTypeSource>,
}

/// Every provider store the gateway can reach.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Registration>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One in-memory store per known provider.
    pub fn in_memory() -> Self {
        let mut registry = Self::new();
        for name in ProviderName::ALL {
            registry.register(Arc::new(InMemoryProviderStore::new(name)));
        }
        registry
    }

    /// Adds a store, replacing any store already registered under its name.
    pub fn register<S>(&mut self, store: Arc<S>) -> &mut Self
    where
        S: ProviderStore + 'static,
    {
        let name = store.device();
        let registration = Registration {
            name,
            store: store.clone(),
            source: store,
        };
        match self.providers.iter_mut().find(|r| r.name == name) {
            Some(existing) => *existing = registration,
            None => self.providers.push(registration),
        }
        self
    }

    /// Looks up the store for `name`.
    pub fn store(&self, name: ProviderName) -> Result<Arc<dyn ProviderStore>> {
        self.providers
            .iter()
            .find(|r| r.name == name)
            .map(|r| Arc::clone(&r.store))
            .ok_or_else(|| GatewayError::UnknownProvider(name.to_string()))
    }

    /// Every store viewed through the aggregation capability.
    pub fn sources(&self) -> Vec<Arc<dyn LatestByTypeSource>> {
        self.providers.iter().map(|r| Arc::clone(&r.source)).collect()
    }

    pub fn names(&self) -> Vec<ProviderName> {
        self.providers.iter().map(|r| r.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_registers_all_providers() {
        let registry = ProviderRegistry::in_memory();
        assert_eq!(registry.names(), ProviderName::ALL.to_vec());
        assert_eq!(registry.sources().len(), 4);
    }

    #[test]
    fn test_unregistered_provider_is_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(InMemoryProviderStore::new(ProviderName::Polar)));

        assert!(registry.store(ProviderName::Polar).is_ok());
        assert!(matches!(
            registry.store(ProviderName::Garmin),
            Err(GatewayError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(InMemoryProviderStore::new(ProviderName::Oura)))
            .register(Arc::new(InMemoryProviderStore::new(ProviderName::Oura)));
        assert_eq!(registry.names(), vec![ProviderName::Oura]);
    }
}
