//! A module's string-keyed deployment property bag, and the typed
//! [`PropertyAccessor`] view over it described in §4.1.

use std::collections::HashMap;

/// Property key names recognized by the planner and bus core, per §6.
pub mod keys {
    pub const COUNT: &str = "count";
    pub const SEQUENCE: &str = "sequence";
    pub const CONCURRENCY: &str = "concurrency";
    pub const CRITERIA: &str = "criteria";

    pub const PARTITION_INDEX: &str = "partitionIndex";
    pub const MAX_ATTEMPTS: &str = "maxAttempts";
    pub const BACK_OFF_INITIAL_INTERVAL: &str = "backOffInitialInterval";
    pub const BACK_OFF_MAX_INTERVAL: &str = "backOffMaxInterval";
    pub const BACK_OFF_MULTIPLIER: &str = "backOffMultiplier";

    pub const NEXT_MODULE_COUNT: &str = "nextModuleCount";
    pub const NEXT_MODULE_CONCURRENCY: &str = "nextModuleConcurrency";
    pub const PARTITION_COUNT: &str = "partitionCount";
    pub const PARTITION_KEY_EXPRESSION: &str = "partitionKeyExpression";
    pub const PARTITION_KEY_EXTRACTOR_CLASS: &str = "partitionKeyExtractorClass";
    pub const PARTITION_SELECTOR_EXPRESSION: &str = "partitionSelectorExpression";
    pub const PARTITION_SELECTOR_CLASS: &str = "partitionSelectorClass";
    pub const DIRECT_BINDING_ALLOWED: &str = "directBindingAllowed";
    pub const BATCHING_ENABLED: &str = "batchingEnabled";
    pub const BATCH_SIZE: &str = "batchSize";
    pub const BATCH_BUFFER_LIMIT: &str = "batchBufferLimit";
    pub const BATCH_TIMEOUT: &str = "batchTimeout";
    pub const COMPRESS: &str = "compress";

    pub const CONSUMER_PREFIX: &str = "consumer.";
    pub const PRODUCER_PREFIX: &str = "producer.";

    /// Every recognized bare key (§6), used by validation to tell a typo
    /// apart from a genuinely unsupported property.
    pub const CONSUMER_KEYS: &[&str] = &[
        COUNT,
        SEQUENCE,
        PARTITION_INDEX,
        CONCURRENCY,
        MAX_ATTEMPTS,
        BACK_OFF_INITIAL_INTERVAL,
        BACK_OFF_MAX_INTERVAL,
        BACK_OFF_MULTIPLIER,
    ];

    pub const PRODUCER_KEYS: &[&str] = &[
        NEXT_MODULE_COUNT,
        NEXT_MODULE_CONCURRENCY,
        PARTITION_COUNT,
        PARTITION_KEY_EXPRESSION,
        PARTITION_KEY_EXTRACTOR_CLASS,
        PARTITION_SELECTOR_EXPRESSION,
        PARTITION_SELECTOR_CLASS,
        DIRECT_BINDING_ALLOWED,
        BATCHING_ENABLED,
        BATCH_SIZE,
        BATCH_BUFFER_LIMIT,
        BATCH_TIMEOUT,
        COMPRESS,
    ];
}

/// A mapping from property name to value, as authored for one module. See
/// §3 `ModuleDeploymentProperties`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleDeploymentProperties(HashMap<String, String>);

impl ModuleDeploymentProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .keys()
            .map(String::as_str)
            .filter(move |k| k.starts_with(prefix))
    }

    /// Merges `other` on top of `self`, used by the planner to fold emitted
    /// `consumer.*`/`producer.*` keys into a module's property bag before
    /// handing it to `BusCore`.
    pub fn merged_with(&self, other: &HashMap<String, String>) -> Self {
        let mut merged = self.0.clone();
        for (k, v) in other {
            merged.insert(k.clone(), v.clone());
        }
        Self(merged)
    }
}

/// Typed view over a [`ModuleDeploymentProperties`] bag, per §4.1. `count`,
/// `sequence`, `concurrency` and `criteria` describe the module itself and
/// are read unprefixed; every other getter is read under the `consumer.` or
/// `producer.` prefix its field carries in §6's key tables.
pub struct PropertyAccessor<'a> {
    properties: &'a ModuleDeploymentProperties,
}

impl<'a> PropertyAccessor<'a> {
    pub fn new(properties: &'a ModuleDeploymentProperties) -> Self {
        Self { properties }
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.properties.get(key).and_then(|v| v.parse().ok())
    }

    fn producer(&self, suffix: &str) -> Option<&'a str> {
        self.properties.get(&format!("{}{}", keys::PRODUCER_PREFIX, suffix))
    }

    fn consumer_parse<T: std::str::FromStr>(&self, suffix: &str) -> Option<T> {
        self.properties
            .get(&format!("{}{}", keys::CONSUMER_PREFIX, suffix))
            .and_then(|v| v.parse().ok())
    }

    fn producer_parse<T: std::str::FromStr>(&self, suffix: &str) -> Option<T> {
        self.producer(suffix).and_then(|v| v.parse().ok())
    }

    pub fn raw_count(&self) -> Option<&'a str> {
        self.properties.get(keys::COUNT)
    }

    pub fn count(&self) -> u32 {
        self.parse(keys::COUNT).unwrap_or(1)
    }

    pub fn sequence(&self) -> i64 {
        self.parse(keys::SEQUENCE).unwrap_or(0)
    }

    pub fn concurrency(&self) -> u32 {
        self.parse(keys::CONCURRENCY).unwrap_or(1)
    }

    pub fn criteria(&self) -> Option<&'a str> {
        self.properties.get(keys::CRITERIA)
    }

    pub fn consumer_max_attempts(&self) -> Option<u32> {
        self.consumer_parse(keys::MAX_ATTEMPTS)
    }

    pub fn consumer_back_off_initial_interval(&self) -> Option<u64> {
        self.consumer_parse(keys::BACK_OFF_INITIAL_INTERVAL)
    }

    pub fn consumer_back_off_max_interval(&self) -> Option<u64> {
        self.consumer_parse(keys::BACK_OFF_MAX_INTERVAL)
    }

    pub fn consumer_back_off_multiplier(&self) -> Option<f64> {
        self.consumer_parse(keys::BACK_OFF_MULTIPLIER)
    }

    pub fn consumer_partition_index(&self) -> Option<i64> {
        self.consumer_parse(keys::PARTITION_INDEX)
    }

    pub fn producer_batching_enabled(&self) -> bool {
        self.producer_parse(keys::BATCHING_ENABLED).unwrap_or(false)
    }

    pub fn producer_batch_size(&self) -> Option<u32> {
        self.producer_parse(keys::BATCH_SIZE)
    }

    pub fn producer_batch_buffer_limit(&self) -> Option<u32> {
        self.producer_parse(keys::BATCH_BUFFER_LIMIT)
    }

    pub fn producer_batch_timeout(&self) -> Option<u64> {
        self.producer_parse(keys::BATCH_TIMEOUT)
    }

    pub fn producer_compress(&self) -> bool {
        self.producer_parse(keys::COMPRESS).unwrap_or(false)
    }

    pub fn producer_partition_count(&self) -> Option<u32> {
        self.producer_parse(keys::PARTITION_COUNT)
    }

    pub fn producer_partition_key_expression(&self) -> Option<&'a str> {
        self.producer(keys::PARTITION_KEY_EXPRESSION)
    }

    pub fn producer_partition_key_extractor_class(&self) -> Option<&'a str> {
        self.producer(keys::PARTITION_KEY_EXTRACTOR_CLASS)
    }

    pub fn producer_partition_selector_expression(&self) -> Option<&'a str> {
        self.producer(keys::PARTITION_SELECTOR_EXPRESSION)
    }

    pub fn producer_partition_selector_class(&self) -> Option<&'a str> {
        self.producer(keys::PARTITION_SELECTOR_CLASS)
    }

    pub fn is_partitioned(&self) -> bool {
        self.producer_partition_key_expression().is_some()
            || self.producer_partition_key_extractor_class().is_some()
    }

    /// `directBindingAllowed` (§4.1): defaults to `true`; any value other
    /// than the literal `"false"` is treated as `true`, with a warning
    /// logged if the raw value was present but neither `"false"` nor
    /// absent.
    pub fn producer_direct_binding_allowed(&self, module_label: &str) -> bool {
        match self.producer(keys::DIRECT_BINDING_ALLOWED) {
            None => true,
            Some("false") => false,
            Some("true") => true,
            Some(other) => {
                tracing::warn!(
                    module = module_label,
                    value = other,
                    "producer.directBindingAllowed has a non-boolean value; treating as absent"
                );
                true
            }
        }
    }

    /// Raw accessor used where the caller needs to tell "explicitly false"
    /// apart from "anything else", without the warning side effect (used by
    /// the planner's eligibility check, which logs the warning itself only
    /// once per module).
    pub fn producer_direct_binding_allowed_raw(&self) -> Option<&'a str> {
        self.producer(keys::DIRECT_BINDING_ALLOWED)
    }
}

/// Timing and sizing defaults from §6, overridable through [`crate::config::BusConfig`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BusDefaults {
    pub back_off_initial_interval_ms: u64,
    pub back_off_max_interval_ms: u64,
    pub back_off_multiplier: f64,
    pub max_attempts: u32,
    pub concurrency: u32,
    pub batch_size: u32,
    pub batch_buffer_limit: u32,
    pub batch_timeout_ms: u64,
}

impl Default for BusDefaults {
    fn default() -> Self {
        BusDefaults {
            back_off_initial_interval_ms: 1000,
            back_off_max_interval_ms: 10_000,
            back_off_multiplier: 2.0,
            max_attempts: 3,
            concurrency: 1,
            batch_size: 50,
            batch_buffer_limit: 10_000,
            batch_timeout_ms: 5000,
        }
    }
}
