//! The transport plugin seam (§1, §6): the concrete broker or in-process
//! channel implementation is explicitly out of scope here. `TransportPlugin`
//! is the contract a real transport binds against; `Endpoint` is the
//! lifecycle handle a binding holds onto.

use std::sync::Arc;

use async_trait::async_trait;

use crate::channel::Channel;
use crate::error::BusError;
use crate::properties::ModuleDeploymentProperties;

/// The live lifecycle handle behind one binding. Mirrors the `pending ->
/// active -> stopped` state machine of §4.8, but the pending/active
/// transition is the transport's concern; this trait only exposes the
/// `stop` edge the bus core drives.
#[async_trait]
pub trait Endpoint: Send + Sync + std::fmt::Debug {
    async fn stop(&self) -> Result<(), BusError>;
}

/// A trivial endpoint for bindings that need no transport-side teardown —
/// principally `DIRECT` bindings, which never talk to a transport plugin.
#[derive(Debug, Default)]
pub struct NoopEndpoint;

#[async_trait]
impl Endpoint for NoopEndpoint {
    async fn stop(&self) -> Result<(), BusError> {
        Ok(())
    }
}

/// External collaborator: a concrete message-transport implementation
/// (a broker client, an in-memory bus, ...). Out of scope for this crate;
/// only the contract is specified here.
#[async_trait]
pub trait TransportPlugin: Send + Sync {
    async fn bind_producer(
        &self,
        name: &str,
        channel: Arc<dyn Channel>,
        properties: &ModuleDeploymentProperties,
    ) -> Result<Arc<dyn Endpoint>, BusError>;

    async fn bind_consumer(
        &self,
        name: &str,
        channel: Arc<dyn Channel>,
        properties: &ModuleDeploymentProperties,
    ) -> Result<Arc<dyn Endpoint>, BusError>;

    async fn bind_pubsub_producer(
        &self,
        name: &str,
        channel: Arc<dyn Channel>,
        properties: &ModuleDeploymentProperties,
    ) -> Result<Arc<dyn Endpoint>, BusError>;

    async fn bind_pubsub_consumer(
        &self,
        name: &str,
        channel: Arc<dyn Channel>,
        properties: &ModuleDeploymentProperties,
    ) -> Result<Arc<dyn Endpoint>, BusError>;

    /// Transport-specific property keys to accept in addition to the core
    /// set in §6, per role.
    fn supported_producer_properties(&self) -> &[&'static str] {
        &[]
    }

    fn supported_consumer_properties(&self) -> &[&'static str] {
        &[]
    }
}
