//! The `BindingTable` of §4.6: a single monitor over a linear list of live
//! bindings. Adequate for bind populations in the hundreds (§9 REDESIGN
//! FLAGS notes the indexed-map upgrade path for larger deployments).

use std::sync::{Arc, Mutex};

use super::{Binding, Role};
use crate::channel::Channel;

#[derive(Debug, Default)]
pub struct BindingTable {
    bindings: Mutex<Vec<Arc<Binding>>>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, binding: Arc<Binding>) {
        self.bindings.lock().expect("binding table mutex poisoned").push(binding);
    }

    /// Removes and returns the binding matching `(name, role, channel)`, if
    /// any. Channel identity is compared by pointer, matching the "same
    /// local channel" semantics unbind operates on.
    pub fn remove(&self, name: &str, role: Role, channel: &Arc<dyn Channel>) -> Option<Arc<Binding>> {
        let mut bindings = self.bindings.lock().expect("binding table mutex poisoned");
        let position = bindings
            .iter()
            .position(|b| b.name == name && b.role == role && b.same_channel(channel))?;
        Some(bindings.remove(position))
    }

    pub fn remove_binding(&self, target: &Arc<Binding>) {
        let mut bindings = self.bindings.lock().expect("binding table mutex poisoned");
        bindings.retain(|b| !Arc::ptr_eq(b, target));
    }

    pub fn find_by_name(&self, name: &str, role: Role) -> Option<Arc<Binding>> {
        let bindings = self.bindings.lock().expect("binding table mutex poisoned");
        bindings.iter().find(|b| b.name == name && b.role == role).cloned()
    }

    pub fn find_all(&self, name: &str) -> Vec<Arc<Binding>> {
        let bindings = self.bindings.lock().expect("binding table mutex poisoned");
        bindings.iter().filter(|b| b.name == name).cloned().collect()
    }

    pub fn find_all_by_role(&self, name: &str, role: Role) -> Vec<Arc<Binding>> {
        let bindings = self.bindings.lock().expect("binding table mutex poisoned");
        bindings
            .iter()
            .filter(|b| b.name == name && b.role == role)
            .cloned()
            .collect()
    }

    /// Snapshots the current bindings under the lock, so callers (notably
    /// `stop_all`) never iterate or dispatch stop while holding it.
    pub fn snapshot(&self) -> Vec<Arc<Binding>> {
        self.bindings.lock().expect("binding table mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().expect("binding table mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelMode, FlumeChannel};
    use crate::planner::RuntimeModuleDeploymentProperties;
    use crate::transport::NoopEndpoint;

    fn binding(name: &str, role: Role, channel: Arc<dyn Channel>) -> Arc<Binding> {
        Binding::new(
            name,
            role,
            channel,
            None,
            RuntimeModuleDeploymentProperties::empty(),
            Arc::new(NoopEndpoint),
        )
    }

    #[test]
    fn add_then_find_by_name_and_role() {
        let table = BindingTable::new();
        let channel: Arc<dyn Channel> = Arc::new(FlumeChannel::unbounded(ChannelMode::Dynamic));
        table.add(binding("orders", Role::Producer, channel.clone()));
        assert!(table.find_by_name("orders", Role::Producer).is_some());
        assert!(table.find_by_name("orders", Role::Consumer).is_none());
    }

    #[test]
    fn remove_drops_the_matching_binding_only() {
        let table = BindingTable::new();
        let channel_a: Arc<dyn Channel> = Arc::new(FlumeChannel::unbounded(ChannelMode::Dynamic));
        let channel_b: Arc<dyn Channel> = Arc::new(FlumeChannel::unbounded(ChannelMode::Dynamic));
        table.add(binding("orders", Role::Producer, channel_a.clone()));
        table.add(binding("orders", Role::Producer, channel_b.clone()));
        assert_eq!(table.find_all("orders").len(), 2);

        let removed = table.remove("orders", Role::Producer, &channel_a);
        assert!(removed.is_some());
        assert_eq!(table.find_all("orders").len(), 1);
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let table = BindingTable::new();
        let channel: Arc<dyn Channel> = Arc::new(FlumeChannel::unbounded(ChannelMode::Dynamic));
        table.add(binding("orders", Role::Producer, channel.clone()));
        let snapshot = table.snapshot();
        table.remove("orders", Role::Producer, &channel);
        assert_eq!(snapshot.len(), 1);
        assert!(table.is_empty());
    }
}
