//! The stream/module data model of §3, and the `ModulePropertyProvider`
//! seam that replaces the source's ambient per-module property lookup
//! (§9 "Global/ambient state").

use crate::properties::ModuleDeploymentProperties;

/// Identity and static configuration of one processing step in a stream.
/// Immutable once constructed, per §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub stream_name: String,
    pub label: String,
    pub index: usize,
    pub properties: ModuleDeploymentProperties,
}

impl ModuleDescriptor {
    pub fn new(
        stream_name: impl Into<String>,
        label: impl Into<String>,
        index: usize,
        properties: ModuleDeploymentProperties,
    ) -> Self {
        ModuleDescriptor {
            stream_name: stream_name.into(),
            label: label.into(),
            index,
            properties,
        }
    }

    /// The module identifier used in error messages and logs: `stream/label`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.stream_name, self.label)
    }
}

/// An ordered, non-empty sequence of modules forming a data pipeline, per
/// §3. Immutable once deployed.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    name: String,
    modules: Vec<ModuleDescriptor>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("a stream must contain at least one module")]
    Empty,
}

impl Stream {
    pub fn new(name: impl Into<String>, modules: Vec<ModuleDescriptor>) -> Result<Self, StreamError> {
        if modules.is_empty() {
            return Err(StreamError::Empty);
        }
        Ok(Stream {
            name: name.into(),
            modules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn source(&self) -> &ModuleDescriptor {
        &self.modules[0]
    }

    pub fn sink(&self) -> &ModuleDescriptor {
        &self.modules[self.modules.len() - 1]
    }

    pub fn previous(&self, index: usize) -> Option<&ModuleDescriptor> {
        index.checked_sub(1).map(|i| &self.modules[i])
    }

    pub fn next(&self, index: usize) -> Option<&ModuleDescriptor> {
        self.modules.get(index + 1)
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.modules.len()
    }
}

/// Supplies a module's base deployment properties. The default
/// implementation simply reads `ModuleDescriptor::properties`; a deployment
/// driver that tracks per-replica overrides out of band can supply its own.
pub trait ModulePropertyProvider: Send + Sync {
    fn properties_for<'a>(&self, module: &'a ModuleDescriptor) -> &'a ModuleDeploymentProperties;
}

#[derive(Debug, Default)]
pub struct DescriptorPropertyProvider;

impl ModulePropertyProvider for DescriptorPropertyProvider {
    fn properties_for<'a>(&self, module: &'a ModuleDescriptor) -> &'a ModuleDeploymentProperties {
        &module.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_streams() {
        assert_eq!(Stream::new("s", vec![]), Err(StreamError::Empty));
    }

    #[test]
    fn source_and_sink_of_single_module_stream_are_the_same_module() {
        let module = ModuleDescriptor::new("s", "only", 0, ModuleDeploymentProperties::new());
        let stream = Stream::new("s", vec![module.clone()]).unwrap();
        assert_eq!(stream.source(), &module);
        assert_eq!(stream.sink(), &module);
        assert!(stream.is_last(0));
        assert_eq!(stream.previous(0), None);
        assert_eq!(stream.next(0), None);
    }
}
