//! Replaces the source's runtime class-name dispatch for partition key
//! extractors and partition selectors (§9 Design Notes, §9 Open Question).
//! A `ByName` lookup against a pre-registered, named strategy stands in for
//! "resolve by class name, instantiate, cache"; there is no reflection.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::BusError;
use crate::message::{Message, PartitionKey};
use crate::partitioning::PartitionSelector;

pub trait KeyExtractor: Send + Sync + std::fmt::Debug {
    fn extract_key(&self, message: &Message) -> Option<PartitionKey>;
}

/// Looks strategies up by the name they were registered under. Kept
/// separate for key extractors and partition selectors so the two
/// capabilities can never be confused with each other — the bug the source
/// had in `invokePartitionSelector` (§9 Open Question) is structurally
/// impossible here.
pub trait StrategyRegistry: Send + Sync {
    fn key_extractor(&self, name: &str) -> Option<Arc<dyn KeyExtractor>>;
    fn partition_selector(&self, name: &str) -> Option<Arc<dyn PartitionSelector>>;

    fn register_key_extractor(&self, name: &str, extractor: Arc<dyn KeyExtractor>);
    fn register_partition_selector(&self, name: &str, selector: Arc<dyn PartitionSelector>);
}

/// A `DashMap`-backed registry. Entries are expected to be registered once
/// (e.g. at application start) and looked up many times; lookups never
/// allocate or lock beyond the shard they hash to.
#[derive(Debug, Default)]
pub struct InMemoryStrategyRegistry {
    key_extractors: DashMap<String, Arc<dyn KeyExtractor>>,
    partition_selectors: DashMap<String, Arc<dyn PartitionSelector>>,
}

impl InMemoryStrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StrategyRegistry for InMemoryStrategyRegistry {
    fn key_extractor(&self, name: &str) -> Option<Arc<dyn KeyExtractor>> {
        self.key_extractors.get(name).map(|entry| entry.clone())
    }

    fn partition_selector(&self, name: &str) -> Option<Arc<dyn PartitionSelector>> {
        self.partition_selectors.get(name).map(|entry| entry.clone())
    }

    fn register_key_extractor(&self, name: &str, extractor: Arc<dyn KeyExtractor>) {
        self.key_extractors.insert(name.to_string(), extractor);
    }

    fn register_partition_selector(&self, name: &str, selector: Arc<dyn PartitionSelector>) {
        self.partition_selectors.insert(name.to_string(), selector);
    }
}

pub fn resolve_key_extractor(
    registry: &dyn StrategyRegistry,
    name: &str,
) -> Result<Arc<dyn KeyExtractor>, BusError> {
    registry
        .key_extractor(name)
        .ok_or_else(|| BusError::class_resolution(name, "no key extractor registered under this name"))
}

pub fn resolve_partition_selector(
    registry: &dyn StrategyRegistry,
    name: &str,
) -> Result<Arc<dyn PartitionSelector>, BusError> {
    registry
        .partition_selector(name)
        .ok_or_else(|| BusError::class_resolution(name, "no partition selector registered under this name"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct ConstantExtractor(&'static str);
    impl KeyExtractor for ConstantExtractor {
        fn extract_key(&self, _message: &Message) -> Option<PartitionKey> {
            Some(PartitionKey::from(self.0))
        }
    }

    #[test]
    fn registered_extractor_resolves_by_name() {
        let registry = InMemoryStrategyRegistry::new();
        registry.register_key_extractor("const", Arc::new(ConstantExtractor("k")));
        let extractor = resolve_key_extractor(&registry, "const").unwrap();
        let message = Message::default();
        assert_eq!(extractor.extract_key(&message).unwrap().as_str(), "k");
    }

    #[test]
    fn unknown_name_is_a_class_resolution_error() {
        let registry = InMemoryStrategyRegistry::new();
        let err = resolve_key_extractor(&registry, "missing").unwrap_err();
        assert!(matches!(err, BusError::ClassResolution { .. }));
    }

    #[test]
    fn extractor_and_selector_namespaces_never_cross() {
        let registry = InMemoryStrategyRegistry::new();
        registry.register_key_extractor("shared-name", Arc::new(ConstantExtractor("k")));
        assert!(registry.partition_selector("shared-name").is_none());
    }
}
