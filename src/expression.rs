//! The pluggable expression capability described in §9: the core does not
//! mandate an expression language, only the two evaluation shapes
//! `evaluate(ctx, message) -> value` and `evaluate(ctx, key, int) -> int`.

use crate::error::BusError;
use crate::message::{Message, PartitionKey};

pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluates a key-extraction expression (e.g. `producer.partitionKeyExpression`)
    /// against a message.
    fn evaluate_key(&self, expression: &str, message: &Message) -> Result<Option<PartitionKey>, BusError>;

    /// Evaluates a partition-selection expression with the key in scope,
    /// coerced to an integer.
    fn evaluate_partition(&self, expression: &str, key: &PartitionKey) -> Result<i64, BusError>;
}

/// A small reference evaluator good enough for `payload.field` and
/// `headers['key']`-shaped expressions. Production deployments are
/// expected to embed a real expression engine or pre-compiled closures, per
/// §9.
#[derive(Debug, Default)]
pub struct PathExpressionEvaluator;

impl PathExpressionEvaluator {
    fn resolve_payload_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
        path.split('.').try_fold(value, |current, segment| current.get(segment))
    }

    fn resolve_header(expression: &str) -> Option<&str> {
        let inner = expression
            .strip_prefix("headers['")
            .or_else(|| expression.strip_prefix("headers[\""))?;
        let inner = inner.strip_suffix("']").or_else(|| inner.strip_suffix("\"]"))?;
        Some(inner)
    }
}

impl ExpressionEvaluator for PathExpressionEvaluator {
    fn evaluate_key(&self, expression: &str, message: &Message) -> Result<Option<PartitionKey>, BusError> {
        if let Some(header_name) = Self::resolve_header(expression) {
            return Ok(message.headers.get(header_name).map(|v| PartitionKey(v.clone())));
        }

        let path = expression.strip_prefix("payload.").unwrap_or(expression);
        let json = message.payload_as_json();
        let resolved = Self::resolve_payload_path(&json, path);
        Ok(resolved.map(|value| match value {
            serde_json::Value::String(s) => PartitionKey(s.clone()),
            other => PartitionKey(other.to_string()),
        }))
    }

    fn evaluate_partition(&self, expression: &str, key: &PartitionKey) -> Result<i64, BusError> {
        // The only expression shape this reference evaluator understands
        // is a direct parse of the key itself as an integer.
        let _ = expression;
        key.as_str()
            .parse::<i64>()
            .map_err(|e| BusError::binding("partitionSelectorExpression", e.to_string()))
    }
}
