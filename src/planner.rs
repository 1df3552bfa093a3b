//! The stream-aware property planner of §4.7: walks a module's position in
//! its stream and derives the `consumer.*`/`producer.*` properties BusCore
//! needs to bind it.

use std::collections::HashMap;

use crate::error::ValidationError;
use crate::properties::{keys, ModuleDeploymentProperties, PropertyAccessor};
use crate::stream::{ModuleDescriptor, ModulePropertyProvider, Stream};

/// The static properties of a module plus the `sequence` assigned to this
/// particular replica, and the `consumer.*`/`producer.*` keys the planner
/// derived for it. Produced by [`PropertyPlanner::plan`]; consumed by
/// `BusCore`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeModuleDeploymentProperties {
    pub sequence: i64,
    base: ModuleDeploymentProperties,
    emitted: HashMap<String, String>,
}

impl RuntimeModuleDeploymentProperties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.emitted
            .get(key)
            .map(String::as_str)
            .or_else(|| self.base.get(key))
    }

    pub fn emitted(&self) -> &HashMap<String, String> {
        &self.emitted
    }

    pub fn count(&self) -> u32 {
        PropertyAccessor::new(&self.base).count()
    }

    /// Flattens the base properties and the planner's derived keys into a
    /// single bag, as handed to `BusCore::bind_*`.
    pub fn into_flat(self) -> ModuleDeploymentProperties {
        self.base.merged_with(&self.emitted)
    }

    pub fn flat(&self) -> ModuleDeploymentProperties {
        self.base.merged_with(&self.emitted)
    }

    /// Wraps an already-flat property bag (no planner-derived keys to
    /// track separately) as handed directly to `BusCore::bind_*` without
    /// going through `PropertyPlanner::plan`.
    pub fn from_flat(properties: ModuleDeploymentProperties) -> Self {
        RuntimeModuleDeploymentProperties {
            sequence: 0,
            base: properties,
            emitted: HashMap::new(),
        }
    }

    /// An empty instance, for tests that need a `RuntimeModuleDeploymentProperties`
    /// but aren't exercising the planner itself.
    #[cfg(any(test, feature = "test-util"))]
    pub fn empty() -> Self {
        Self::from_flat(ModuleDeploymentProperties::new())
    }
}

pub struct PropertyPlanner;

impl PropertyPlanner {
    /// Implements §4.7's five-step algorithm, deterministically and without
    /// mutating the stream.
    pub fn plan(
        stream: &Stream,
        module: &ModuleDescriptor,
        provider: &dyn ModulePropertyProvider,
    ) -> Result<RuntimeModuleDeploymentProperties, ValidationError> {
        let base = provider.properties_for(module).clone();
        let accessor = PropertyAccessor::new(&base);
        let sequence = accessor.sequence();
        let index = module.index;
        let mut emitted = HashMap::new();

        // Step 2: not first.
        if index > 0 {
            emitted.insert(consumer_key(keys::SEQUENCE), sequence.to_string());
            emitted.insert(consumer_key(keys::COUNT), accessor.count().to_string());

            if let Some(previous) = stream.previous(index) {
                let previous_properties = provider.properties_for(previous);
                let previous_accessor = PropertyAccessor::new(previous_properties);
                if previous_accessor.is_partitioned() {
                    emitted.insert(consumer_key(keys::PARTITION_INDEX), (sequence - 1).to_string());
                }
            }
        }

        let next = stream.next(index);

        // Step 3: not last.
        if let Some(next) = next {
            let next_properties = provider.properties_for(next);
            let next_accessor = PropertyAccessor::new(next_properties);
            if let Some(count) = next_accessor.raw_count() {
                emitted.insert(producer_key(keys::NEXT_MODULE_COUNT), count.to_string());
            }
            if let Some(concurrency) = next_properties.get(keys::CONCURRENCY) {
                emitted.insert(producer_key(keys::NEXT_MODULE_CONCURRENCY), concurrency.to_string());
            }
        }

        let is_partitioned = accessor.is_partitioned();

        // Step 4: this module is partitioned.
        if is_partitioned {
            match next {
                Some(next) => {
                    let next_properties = provider.properties_for(next);
                    let count = parse_partition_count(next_properties.get(keys::COUNT), &next.id())?;
                    emitted.insert(producer_key(keys::PARTITION_COUNT), count.to_string());
                }
                None => {
                    tracing::warn!(
                        module = module.id(),
                        "partition key declared on a sink module; ignoring"
                    );
                }
            }
        } else if let Some(next) = next {
            // Step 5: direct-binding eligibility.
            let next_properties = provider.properties_for(next);
            let next_accessor = PropertyAccessor::new(next_properties);

            let user_vetoed = accessor.producer_direct_binding_allowed_raw() == Some("false");
            if let Some(raw) = accessor.producer_direct_binding_allowed_raw() {
                if raw != "false" && raw != "true" {
                    tracing::warn!(
                        module = module.id(),
                        value = raw,
                        "producer.directBindingAllowed has a non-boolean value; treating as absent"
                    );
                }
            }

            let counts_unconstrained = accessor.count() == 0 && next_accessor.count() == 0;
            let criteria_match = accessor.criteria() == next_accessor.criteria();

            if !user_vetoed && counts_unconstrained && criteria_match {
                emitted.insert(producer_key(keys::DIRECT_BINDING_ALLOWED), "true".to_string());
            }
        }

        Ok(RuntimeModuleDeploymentProperties {
            sequence,
            base,
            emitted,
        })
    }
}

fn consumer_key(suffix: &str) -> String {
    format!("{}{}", keys::CONSUMER_PREFIX, suffix)
}

fn producer_key(suffix: &str) -> String {
    format!("{}{}", keys::PRODUCER_PREFIX, suffix)
}

/// The raw string must parse as an integer strictly greater than 1;
/// absent, empty, unparseable, or <=1 values each yield a distinct,
/// descriptive error naming the offending module, per §4.7.
fn parse_partition_count(raw: Option<&str>, module_id: &str) -> Result<u32, ValidationError> {
    let reason = match raw {
        None => Some("count is not declared".to_string()),
        Some("") => Some("count is empty".to_string()),
        Some(value) => match value.parse::<i64>() {
            Err(_) => Some(format!("count '{value}' is not an integer")),
            Ok(n) if n <= 1 => Some(format!("count {n} must be greater than 1 to partition across")),
            Ok(n) => return Ok(n as u32),
        },
    };
    Err(ValidationError::InvalidPartitionCount {
        module: module_id.to_string(),
        reason: reason.expect("all non-returning branches set a reason"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::DescriptorPropertyProvider;

    fn module(label: &str, index: usize, props: &[(&str, &str)]) -> ModuleDescriptor {
        ModuleDescriptor::new("s", label, index, ModuleDeploymentProperties::from_pairs(props.to_vec()))
    }

    #[test]
    fn scenario_1_three_module_pipeline_no_partitioning() {
        let a = module("A", 0, &[("count", "1"), ("sequence", "1")]);
        let b = module("B", 1, &[("count", "1"), ("sequence", "1")]);
        let c = module("C", 2, &[("count", "1"), ("sequence", "1")]);
        let stream = Stream::new("s", vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let provider = DescriptorPropertyProvider;

        let plan_a = PropertyPlanner::plan(&stream, &a, &provider).unwrap();
        assert!(plan_a.emitted().keys().all(|k| !k.starts_with("consumer.")));
        assert_eq!(plan_a.get("producer.nextModuleCount"), Some("1"));

        let plan_b = PropertyPlanner::plan(&stream, &b, &provider).unwrap();
        assert_eq!(plan_b.get("consumer.sequence"), Some("1"));
        assert_eq!(plan_b.get("consumer.count"), Some("1"));

        let plan_c = PropertyPlanner::plan(&stream, &c, &provider).unwrap();
        assert_eq!(plan_c.get("consumer.sequence"), Some("1"));
        assert_eq!(plan_c.get("consumer.count"), Some("1"));
        assert!(plan_c.emitted().keys().all(|k| !k.starts_with("producer.")));
    }

    #[test]
    fn scenario_2_partitioned_producer() {
        let a = module(
            "A",
            0,
            &[("count", "1"), ("sequence", "1"), ("producer.partitionKeyExpression", "payload.id")],
        );
        let b3 = module("B", 1, &[("count", "3"), ("sequence", "3")]);
        let stream = Stream::new("s", vec![a.clone(), b3.clone()]).unwrap();
        let provider = DescriptorPropertyProvider;

        let plan_a = PropertyPlanner::plan(&stream, &a, &provider).unwrap();
        assert_eq!(plan_a.get("producer.partitionCount"), Some("3"));

        let plan_b3 = PropertyPlanner::plan(&stream, &b3, &provider).unwrap();
        assert_eq!(plan_b3.get("consumer.partitionIndex"), Some("2"));

        let b1 = module("B", 1, &[("count", "3"), ("sequence", "1")]);
        let stream1 = Stream::new("s", vec![a.clone(), b1.clone()]).unwrap();
        let plan_b1 = PropertyPlanner::plan(&stream1, &b1, &provider).unwrap();
        assert_eq!(plan_b1.get("consumer.partitionIndex"), Some("0"));
        assert_eq!(plan_b1.get("consumer.sequence"), Some("1"));
    }

    #[test]
    fn scenario_3_invalid_partition_count_names_offending_module_and_count() {
        let a = module("A", 0, &[("producer.partitionKeyExpression", "payload.id")]);
        let b = module("B", 1, &[("count", "1")]);
        let stream = Stream::new("s", vec![a.clone(), b]).unwrap();
        let provider = DescriptorPropertyProvider;

        let err = PropertyPlanner::plan(&stream, &a, &provider).unwrap_err();
        match err {
            ValidationError::InvalidPartitionCount { module, reason } => {
                assert_eq!(module, "s/B");
                assert!(reason.contains("count"));
            }
            other => panic!("expected InvalidPartitionCount, got {other:?}"),
        }
    }

    #[test]
    fn scenario_4_direct_binding_eligible() {
        let a = module("A", 0, &[("count", "0")]);
        let b = module("B", 1, &[("count", "0")]);
        let stream = Stream::new("s", vec![a.clone(), b]).unwrap();
        let provider = DescriptorPropertyProvider;

        let plan_a = PropertyPlanner::plan(&stream, &a, &provider).unwrap();
        assert_eq!(plan_a.get("producer.directBindingAllowed"), Some("true"));
    }

    #[test]
    fn scenario_5_direct_binding_vetoed() {
        let a = module("A", 0, &[("count", "0"), ("producer.directBindingAllowed", "false")]);
        let b = module("B", 1, &[("count", "0")]);
        let stream = Stream::new("s", vec![a.clone(), b]).unwrap();
        let provider = DescriptorPropertyProvider;

        let plan_a = PropertyPlanner::plan(&stream, &a, &provider).unwrap();
        assert_eq!(plan_a.get("producer.directBindingAllowed"), None);
    }

    #[test]
    fn direct_binding_not_eligible_when_criteria_differ() {
        let a = module("A", 0, &[("count", "0"), ("criteria", "zone=east")]);
        let b = module("B", 1, &[("count", "0"), ("criteria", "zone=west")]);
        let stream = Stream::new("s", vec![a.clone(), b]).unwrap();
        let provider = DescriptorPropertyProvider;

        let plan_a = PropertyPlanner::plan(&stream, &a, &provider).unwrap();
        assert_eq!(plan_a.get("producer.directBindingAllowed"), None);
    }

    #[test]
    fn partitioned_sink_is_ignored_not_fatal() {
        let a = module("A", 0, &[("producer.partitionKeyExpression", "payload.id")]);
        let stream = Stream::new("s", vec![a.clone()]).unwrap();
        let provider = DescriptorPropertyProvider;

        let plan_a = PropertyPlanner::plan(&stream, &a, &provider).unwrap();
        assert_eq!(plan_a.get("producer.partitionCount"), None);
    }
}
