//! The `SharedChannelRegistry` of §4.5: a name-keyed, idempotent channel
//! factory. The lookup-then-create sequence needs a single atomic step,
//! which `dashmap`'s entry API gives for free without a registry-wide lock.

use std::sync::Arc;

use dashmap::DashMap;

use crate::channel::Channel;

/// Creates a fresh channel of the registry's configured kind. Kept generic
/// over a factory closure rather than a fixed concrete channel type so
/// callers can register pub-sub or job channels under the same registry
/// shape.
pub struct SharedChannelRegistry<F>
where
    F: Fn() -> Arc<dyn Channel> + Send + Sync,
{
    channels: DashMap<String, Arc<dyn Channel>>,
    factory: F,
}

impl<F> SharedChannelRegistry<F>
where
    F: Fn() -> Arc<dyn Channel> + Send + Sync,
{
    pub fn new(factory: F) -> Self {
        SharedChannelRegistry {
            channels: DashMap::new(),
            factory,
        }
    }

    pub fn lookup_shared_channel(&self, name: &str) -> Option<Arc<dyn Channel>> {
        self.channels.get(name).map(|entry| entry.clone())
    }

    /// Creates and registers a channel under `name`. Idempotent: a second
    /// call for the same name returns the first channel rather than
    /// creating a second one.
    pub fn create_and_register_channel(&self, name: &str) -> Arc<dyn Channel> {
        self.lookup_or_create_tracked(name).0
    }

    pub fn lookup_or_create(&self, name: &str) -> Arc<dyn Channel> {
        self.lookup_or_create_tracked(name).0
    }

    /// Same as [`Self::lookup_or_create`], but also reports whether this
    /// call created the channel — used by `BusCore::bind_dynamic_producer`
    /// to know whether to tear the channel back down on a failed bind.
    pub fn lookup_or_create_tracked(&self, name: &str) -> (Arc<dyn Channel>, bool) {
        use dashmap::mapref::entry::Entry;
        match self.channels.entry(name.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let channel = (self.factory)();
                entry.insert(channel.clone());
                (channel, true)
            }
        }
    }

    pub fn remove(&self, name: &str) {
        self.channels.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelMode, FlumeChannel};

    fn registry() -> SharedChannelRegistry<impl Fn() -> Arc<dyn Channel>> {
        SharedChannelRegistry::new(|| Arc::new(FlumeChannel::unbounded(ChannelMode::Dynamic)) as Arc<dyn Channel>)
    }

    #[test]
    fn create_and_register_is_idempotent() {
        let registry = registry();
        let first = registry.create_and_register_channel("orders");
        let second = registry.create_and_register_channel("orders");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn lookup_before_creation_is_none() {
        let registry = registry();
        assert!(registry.lookup_shared_channel("orders").is_none());
    }

    #[test]
    fn tracked_lookup_reports_whether_it_created() {
        let registry = registry();
        let (_, created_first) = registry.lookup_or_create_tracked("orders");
        let (_, created_second) = registry.lookup_or_create_tracked("orders");
        assert!(created_first);
        assert!(!created_second);
    }
}
