//! `BusCore`, the binding engine of §4.8: bind/unbind producer/consumer,
//! the direct-binding optimization, partition routing and retry template
//! construction.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::binding::{Binding, BindingTable, Role};
use crate::channel::{classify_channel_name, Channel, ChannelMode};
use crate::error::{BusError, ValidationError};
use crate::expression::ExpressionEvaluator;
use crate::message::{Message, PartitionKey};
use crate::partitioning::{DefaultPartitionSelector, PartitionSelector, PartitioningMetadata};
use crate::planner::RuntimeModuleDeploymentProperties;
use crate::properties::{keys, BusDefaults, ModuleDeploymentProperties, PropertyAccessor};
use crate::registry::SharedChannelRegistry;
use crate::strategy::{self, StrategyRegistry};
use crate::transport::{NoopEndpoint, TransportPlugin};

/// A consumer retry policy: count-based attempts with exponential backoff.
/// Built by [`build_retry`]; `None` means "retry is disabled, one delivery
/// attempt only" (§4.8).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
}

/// Implements §4.8's `buildRetry`: no retry when `maxAttempts <= 1`,
/// otherwise a count-based policy with exponential backoff, defaulting any
/// unset field to the bus's configured defaults.
pub fn build_retry(accessor: &PropertyAccessor, defaults: &BusDefaults) -> Option<RetryPolicy> {
    let max_attempts = accessor.consumer_max_attempts().unwrap_or(defaults.max_attempts);
    if max_attempts <= 1 {
        return None;
    }
    Some(RetryPolicy {
        max_attempts,
        initial_interval_ms: accessor
            .consumer_back_off_initial_interval()
            .unwrap_or(defaults.back_off_initial_interval_ms),
        multiplier: accessor
            .consumer_back_off_multiplier()
            .unwrap_or(defaults.back_off_multiplier),
        max_interval_ms: accessor
            .consumer_back_off_max_interval()
            .unwrap_or(defaults.back_off_max_interval_ms),
    })
}

/// Two-phase construction (§9 Design Notes): `BusCoreBuilder::build()`
/// produces an unstarted `BusCore`; `BusCore::start()` is the unique point
/// at which its invariants become live.
pub struct BusCoreBuilder {
    transport: Arc<dyn TransportPlugin>,
    strategies: Arc<dyn StrategyRegistry>,
    defaults: BusDefaults,
    default_selector: Arc<dyn PartitionSelector>,
    expression_evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl BusCoreBuilder {
    pub fn new(transport: Arc<dyn TransportPlugin>, strategies: Arc<dyn StrategyRegistry>) -> Self {
        BusCoreBuilder {
            transport,
            strategies,
            defaults: BusDefaults::default(),
            default_selector: Arc::new(DefaultPartitionSelector),
            expression_evaluator: None,
        }
    }

    pub fn with_defaults(mut self, defaults: BusDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Supplies the pluggable expression capability (§9) used to evaluate
    /// `partitionKeyExpression`/`partitionSelectorExpression`. Without one,
    /// those two properties fail to resolve at partition-routing time.
    pub fn with_expression_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.expression_evaluator = Some(evaluator);
        self
    }

    pub fn build(self) -> BusCore {
        BusCore {
            bindings: BindingTable::new(),
            registry: SharedChannelRegistry::new(dynamic_channel_factory as fn() -> Arc<dyn Channel>),
            transport: self.transport,
            strategies: self.strategies,
            default_selector: self.default_selector,
            expression_evaluator: self.expression_evaluator,
            defaults: self.defaults,
            started: AtomicBool::new(false),
        }
    }
}

fn dynamic_channel_factory() -> Arc<dyn Channel> {
    Arc::new(crate::channel::FlumeChannel::unbounded(ChannelMode::Dynamic))
}

pub struct BusCore {
    bindings: BindingTable,
    registry: SharedChannelRegistry<fn() -> Arc<dyn Channel>>,
    transport: Arc<dyn TransportPlugin>,
    strategies: Arc<dyn StrategyRegistry>,
    default_selector: Arc<dyn PartitionSelector>,
    expression_evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    defaults: BusDefaults,
    started: AtomicBool,
}

impl BusCore {
    /// The unique point at which the bus's invariants become live; no
    /// bind/unbind call succeeds before this, per §9.
    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    fn ensure_started(&self) -> Result<(), BusError> {
        if self.started.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(BusError::binding("bus-core", "BusCore::start() was never called"))
        }
    }

    fn validate(
        &self,
        module_id: &str,
        prefix: &str,
        core_supported: &[&str],
        transport_supported: &[&str],
        properties: &ModuleDeploymentProperties,
    ) -> Result<(), ValidationError> {
        let supported: HashSet<&str> = core_supported.iter().chain(transport_supported.iter()).copied().collect();
        let unsupported: Vec<String> = properties
            .keys_with_prefix(prefix)
            .filter(|key| !supported.contains(&key[prefix.len()..]))
            .map(String::from)
            .collect();
        if unsupported.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedProperties {
                module: module_id.to_string(),
                keys: unsupported,
            })
        }
    }

    fn validate_producer(&self, name: &str, properties: &ModuleDeploymentProperties) -> Result<(), BusError> {
        self.validate(
            name,
            keys::PRODUCER_PREFIX,
            keys::PRODUCER_KEYS,
            self.transport.supported_producer_properties(),
            properties,
        )
        .map_err(BusError::from)
    }

    fn validate_consumer(&self, name: &str, properties: &ModuleDeploymentProperties) -> Result<(), BusError> {
        self.validate(
            name,
            keys::CONSUMER_PREFIX,
            keys::CONSUMER_KEYS,
            self.transport.supported_consumer_properties(),
            properties,
        )
        .map_err(BusError::from)
    }

    /// §4.8 `bindProducer`: collapses into a `DIRECT` binding when a local
    /// consumer already exists for a dynamic edge name, otherwise defers to
    /// the transport.
    pub async fn bind_producer(
        &self,
        name: &str,
        channel: Arc<dyn Channel>,
        properties: ModuleDeploymentProperties,
    ) -> Result<Arc<Binding>, BusError> {
        self.ensure_started()?;
        self.validate_producer(name, &properties)?;

        if classify_channel_name(name) == ChannelMode::Dynamic
            && PropertyAccessor::new(&properties).producer_direct_binding_allowed(name)
        {
            if let Some(consumer) = self.bindings.find_by_name(name, Role::Consumer) {
                return Ok(self.establish_direct_binding(name, channel, consumer.channel.clone(), properties));
            }
        }

        let endpoint = self.transport.bind_producer(name, channel.clone(), &properties).await?;
        let binding = Binding::new(
            name,
            Role::Producer,
            channel,
            None,
            RuntimeModuleDeploymentProperties::from_flat(properties),
            endpoint,
        );
        self.bindings.add(binding.clone());
        Ok(binding)
    }

    /// §4.8 `bindConsumer`: after registering, promotes an existing
    /// producer binding for the same name to `DIRECT` when allowed.
    pub async fn bind_consumer(
        &self,
        name: &str,
        channel: Arc<dyn Channel>,
        properties: ModuleDeploymentProperties,
    ) -> Result<Arc<Binding>, BusError> {
        self.ensure_started()?;
        self.validate_consumer(name, &properties)?;

        let endpoint = self.transport.bind_consumer(name, channel.clone(), &properties).await?;
        let consumer_binding = Binding::new(
            name,
            Role::Consumer,
            channel.clone(),
            None,
            RuntimeModuleDeploymentProperties::from_flat(properties),
            endpoint,
        );
        self.bindings.add(consumer_binding.clone());

        if classify_channel_name(name) == ChannelMode::Dynamic {
            if let Some(producer) = self.bindings.find_by_name(name, Role::Producer) {
                let direct_allowed =
                    PropertyAccessor::new(&producer.properties.flat()).producer_direct_binding_allowed(name);
                if direct_allowed {
                    let direct = Binding::new(
                        name,
                        Role::Direct,
                        producer.channel.clone(),
                        Some(channel),
                        producer.properties.clone(),
                        Arc::new(NoopEndpoint),
                    );
                    let _ = producer.endpoint.stop().await;
                    producer.mark_stopped();
                    self.bindings.remove_binding(&producer);
                    self.bindings.add(direct);
                }
            }
        }

        Ok(consumer_binding)
    }

    fn establish_direct_binding(
        &self,
        name: &str,
        producer_channel: Arc<dyn Channel>,
        consumer_channel: Arc<dyn Channel>,
        properties: ModuleDeploymentProperties,
    ) -> Arc<Binding> {
        let binding = Binding::new(
            name,
            Role::Direct,
            producer_channel,
            Some(consumer_channel),
            RuntimeModuleDeploymentProperties::from_flat(properties),
            Arc::new(NoopEndpoint),
        );
        self.bindings.add(binding.clone());
        binding
    }

    /// §4.8 `bindPubSubProducer`: direct binding is never applied to
    /// pub-sub edges.
    pub async fn bind_pubsub_producer(
        &self,
        name: &str,
        channel: Arc<dyn Channel>,
        properties: ModuleDeploymentProperties,
    ) -> Result<Arc<Binding>, BusError> {
        self.ensure_started()?;
        self.validate_producer(name, &properties)?;
        let endpoint = self
            .transport
            .bind_pubsub_producer(name, channel.clone(), &properties)
            .await?;
        let binding = Binding::new(
            name,
            Role::Producer,
            channel,
            None,
            RuntimeModuleDeploymentProperties::from_flat(properties),
            endpoint,
        );
        self.bindings.add(binding.clone());
        Ok(binding)
    }

    pub async fn bind_pubsub_consumer(
        &self,
        name: &str,
        channel: Arc<dyn Channel>,
        properties: ModuleDeploymentProperties,
    ) -> Result<Arc<Binding>, BusError> {
        self.ensure_started()?;
        self.validate_consumer(name, &properties)?;
        let endpoint = self
            .transport
            .bind_pubsub_consumer(name, channel.clone(), &properties)
            .await?;
        let binding = Binding::new(
            name,
            Role::Consumer,
            channel,
            None,
            RuntimeModuleDeploymentProperties::from_flat(properties),
            endpoint,
        );
        self.bindings.add(binding.clone());
        Ok(binding)
    }

    /// §4.8 `bindDynamicProducer`: idempotent on `name` — a second call
    /// returns the binding already registered for it rather than asking the
    /// transport to bind again; tears the newly created channel back down if
    /// the bind itself fails.
    pub async fn bind_dynamic_producer(
        &self,
        name: &str,
        properties: ModuleDeploymentProperties,
    ) -> Result<Arc<Binding>, BusError> {
        self.ensure_started()?;
        if let Some(existing) = self.bindings.find_by_name(name, Role::Producer) {
            return Ok(existing);
        }
        let (channel, created) = self.registry.lookup_or_create_tracked(name);
        match self.bind_producer(name, channel, properties).await {
            Ok(binding) => Ok(binding),
            Err(err) => {
                if created {
                    self.registry.remove(name);
                }
                Err(err)
            }
        }
    }

    pub async fn unbind_producer(&self, name: &str, channel: &Arc<dyn Channel>) -> Result<(), BusError> {
        self.ensure_started()?;
        if let Some(binding) = self.bindings.remove(name, Role::Producer, channel) {
            binding.mark_stopped();
            binding.endpoint.stop().await?;
        }
        Ok(())
    }

    /// §4.8/§5: reverts any `DIRECT` binding for `name` before removing the
    /// consumer — re-binding the original producer through the transport
    /// without re-collapsing to `DIRECT`, since the consumer being removed
    /// is still (momentarily) present in the table.
    pub async fn unbind_consumer(&self, name: &str, channel: &Arc<dyn Channel>) -> Result<(), BusError> {
        self.ensure_started()?;

        if let Some(direct) = self.bindings.find_by_name(name, Role::Direct) {
            let producer_channel = direct.channel.clone();
            let properties = direct.properties.flat();
            let endpoint = self
                .transport
                .bind_producer(name, producer_channel.clone(), &properties)
                .await?;
            let reverted_producer = Binding::new(
                name,
                Role::Producer,
                producer_channel,
                None,
                direct.properties.clone(),
                endpoint,
            );

            let _ = direct.endpoint.stop().await;
            direct.mark_stopped();
            self.bindings.remove_binding(&direct);
            self.bindings.add(reverted_producer);
        }

        if let Some(binding) = self.bindings.remove(name, Role::Consumer, channel) {
            binding.mark_stopped();
            binding.endpoint.stop().await?;
        }
        Ok(())
    }

    pub async fn unbind_producers(&self, name: &str) -> Result<(), BusError> {
        self.ensure_started()?;
        for binding in self.bindings.find_all_by_role(name, Role::Producer) {
            self.bindings.remove_binding(&binding);
            binding.mark_stopped();
            binding.endpoint.stop().await?;
        }
        Ok(())
    }

    pub async fn unbind_consumers(&self, name: &str) -> Result<(), BusError> {
        self.ensure_started()?;
        let channels: Vec<Arc<dyn Channel>> = self
            .bindings
            .find_all_by_role(name, Role::Consumer)
            .into_iter()
            .map(|b| b.channel.clone())
            .collect();
        for channel in channels {
            self.unbind_consumer(name, &channel).await?;
        }
        Ok(())
    }

    /// §4.8/§7: stop every binding, logging but not propagating failures.
    pub async fn stop_all(&self) {
        for binding in self.bindings.snapshot() {
            if let Err(err) = binding.endpoint.stop().await {
                tracing::warn!(binding = binding.name, error = %err, "failed to stop binding during stop_all");
            }
            binding.mark_stopped();
        }
    }

    /// §4.8 `determinePartition`: computes the key, the raw partition, then
    /// reduces it modulo the partition count, taking the absolute value if
    /// negative.
    pub fn determine_partition(&self, message: &Message, meta: &PartitioningMetadata) -> Result<i64, BusError> {
        let key = self.extract_partition_key(message, meta)?;
        let raw = self.select_raw_partition(&key, meta)?;
        let count = meta.partition_count().max(1) as i64;
        let partition = raw % count;
        Ok(partition.abs())
    }

    fn extract_partition_key(
        &self,
        message: &Message,
        meta: &PartitioningMetadata,
    ) -> Result<PartitionKey, BusError> {
        match (meta.partition_key_extractor_class(), meta.partition_key_expression()) {
            (Some(class), None) => {
                let extractor = strategy::resolve_key_extractor(self.strategies.as_ref(), class)?;
                extractor
                    .extract_key(message)
                    .ok_or_else(|| BusError::binding(class, "key extractor produced no key"))
            }
            (None, Some(expr)) => {
                let evaluator = self.expression_evaluator.as_ref().ok_or_else(|| {
                    BusError::binding("partitionKeyExpression", "no ExpressionEvaluator was supplied to this BusCore")
                })?;
                evaluator
                    .evaluate_key(expr, message)?
                    .ok_or_else(|| BusError::binding(expr, "expression produced no key"))
            }
            (Some(_), Some(_)) => Err(BusError::Validation(ValidationError::AmbiguousPartitionKeySource {
                found: "both partitionKeyExtractorClass and partitionKeyExpression",
            })),
            (None, None) => Err(BusError::Validation(ValidationError::AmbiguousPartitionKeySource {
                found: "neither partitionKeyExtractorClass nor partitionKeyExpression",
            })),
        }
    }

    fn select_raw_partition(&self, key: &PartitionKey, meta: &PartitioningMetadata) -> Result<i64, BusError> {
        if let Some(class) = meta.partition_selector_class() {
            let selector = strategy::resolve_partition_selector(self.strategies.as_ref(), class)?;
            return Ok(selector.select_partition(key, meta.partition_count()));
        }
        if let Some(expr) = meta.partition_selector_expression() {
            let evaluator = self.expression_evaluator.as_ref().ok_or_else(|| {
                BusError::binding("partitionSelectorExpression", "no ExpressionEvaluator was supplied to this BusCore")
            })?;
            return evaluator.evaluate_partition(expr, key);
        }
        Ok(self.default_selector.select_partition(key, meta.partition_count()))
    }

    pub fn build_retry(&self, accessor: &PropertyAccessor) -> Option<RetryPolicy> {
        build_retry(accessor, &self.defaults)
    }

    pub fn defaults(&self) -> &BusDefaults {
        &self.defaults
    }

    /// Inspects the live binding table by name and role, for tests that
    /// need to assert on `BusCore`'s internal state (e.g. that no `DIRECT`
    /// binding was ever created).
    #[cfg(any(test, feature = "test-util"))]
    pub fn find_binding(&self, name: &str, role: Role) -> Option<Arc<Binding>> {
        self.bindings.find_by_name(name, role)
    }

    #[cfg(any(test, feature = "test-util"))]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}
