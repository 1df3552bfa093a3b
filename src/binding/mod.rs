//! The live `Binding` record of §3 and its state machine.

pub mod table;

pub use table::BindingTable;

use std::sync::{Arc, Mutex};

use crate::channel::Channel;
use crate::planner::RuntimeModuleDeploymentProperties;
use crate::transport::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Pending,
    Active,
    Stopped,
}

/// A live attachment record: (symbolic name, role, channel, endpoint
/// lifecycle handle, property snapshot), per §3.
#[derive(Debug)]
pub struct Binding {
    pub name: String,
    pub role: Role,
    pub channel: Arc<dyn Channel>,
    /// For `Direct` bindings, the channel on the other side of the
    /// short-circuit: the consumer's channel when the binding was created
    /// from the producer side, or the producer's channel when created from
    /// the consumer side. `None` for plain `Producer`/`Consumer` bindings.
    pub peer_channel: Option<Arc<dyn Channel>>,
    pub properties: RuntimeModuleDeploymentProperties,
    pub endpoint: Arc<dyn Endpoint>,
    state: Mutex<BindingState>,
}

impl Binding {
    pub fn new(
        name: impl Into<String>,
        role: Role,
        channel: Arc<dyn Channel>,
        peer_channel: Option<Arc<dyn Channel>>,
        properties: RuntimeModuleDeploymentProperties,
        endpoint: Arc<dyn Endpoint>,
    ) -> Arc<Self> {
        Arc::new(Binding {
            name: name.into(),
            role,
            channel,
            peer_channel,
            properties,
            endpoint,
            state: Mutex::new(BindingState::Active),
        })
    }

    pub fn state(&self) -> BindingState {
        *self.state.lock().expect("binding state mutex poisoned")
    }

    pub fn mark_stopped(&self) {
        *self.state.lock().expect("binding state mutex poisoned") = BindingState::Stopped;
    }

    pub fn same_channel(&self, channel: &Arc<dyn Channel>) -> bool {
        Arc::ptr_eq(&self.channel, channel)
    }
}
