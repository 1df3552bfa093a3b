//! Binding engine and runtime property planner for a stream message-bus
//! runtime.
//!
//! A deployment is a [`stream::Stream`] of [`stream::ModuleDescriptor`]s,
//! each carrying a [`properties::ModuleDeploymentProperties`] bag.
//! [`planner::PropertyPlanner`] walks a module's position in its stream and
//! derives the `consumer.*`/`producer.*` properties [`bus::BusCore`] needs
//! to bind producer and consumer channels, including the direct-binding
//! optimization that short-circuits co-located modules in-process and the
//! partition routing that fans a producer out across a partitioned
//! consumer's replicas.
//!
//! The concrete transport (a broker client, a cluster-aware in-memory bus,
//! ...) is an external collaborator: [`transport::TransportPlugin`] is the
//! seam it binds against.

pub mod binding;
pub mod bus;
pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod expression;
pub mod message;
pub mod partitioning;
pub mod planner;
pub mod properties;
pub mod registry;
pub mod strategy;
pub mod stream;
pub mod transport;

pub use bus::{BusCore, BusCoreBuilder, RetryPolicy};
pub use error::{BusError, ValidationError};
pub use message::{Message, Payload};
pub use properties::{BusDefaults, ModuleDeploymentProperties, PropertyAccessor};
pub use stream::{ModuleDescriptor, Stream};
