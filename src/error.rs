use thiserror::Error;

/// Errors raised while validating a deployment property bag, either during
/// planning or at bind time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("module '{module}' declares unsupported properties: {}", keys.join(", "))]
    UnsupportedProperties { module: String, keys: Vec<String> },

    #[error("module '{module}' has an invalid partition count: {reason}")]
    InvalidPartitionCount { module: String, reason: String },

    #[error("partition routing needs exactly one of a key extractor or a key expression, got {found}")]
    AmbiguousPartitionKeySource { found: &'static str },
}

/// The single error type surfaced by every `BusCore` and `PropertyPlanner`
/// operation.
#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("binding failed for '{name}': {reason}")]
    BindingFailure { name: String, reason: String },

    #[error("failed to (de)serialize payload of type '{type_name}': {reason}")]
    Serialization { type_name: String, reason: String },

    #[error("failed to resolve strategy '{name}': {reason}")]
    ClassResolution { name: String, reason: String },
}

impl BusError {
    pub fn binding(name: impl Into<String>, reason: impl Into<String>) -> Self {
        BusError::BindingFailure {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn serialization(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        BusError::Serialization {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub fn class_resolution(name: impl Into<String>, reason: impl Into<String>) -> Self {
        BusError::ClassResolution {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
