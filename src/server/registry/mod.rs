//! Capability registration and lookup.
//!
//! A [`RegistryBuilder`] collects descriptors during startup; [`RegistryBuilder::build`]
//! freezes them into a [`CapabilityRegistry`] that is shared read-only.
use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, error};

use crate::lib::errors::ConfigError;

mod descriptor;
mod schema;

pub use descriptor::{
    CapabilityDescriptor, CapabilityHandler, CapabilityKind, CapabilitySummary, HandlerFuture,
    InvocationContext,
};
pub use schema::{InputSchema, ParamSpec, Primitive};

/// Lookup failure for a capability name and kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no {kind} named `{name}` is registered")]
    NotFound { name: String, kind: CapabilityKind },
}

/// Mutable registry used while the server starts.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<CapabilityDescriptor>,
    index: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Names are unique across all kinds.
    ///
    /// On error the builder is left unchanged.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> Result<(), ConfigError> {
        if let Err(err) = validate_descriptor(&descriptor) {
            error!(target: "emu_mcp::registry", name = descriptor.name(), reason = %err, "Rejected capability");
            return Err(err);
        }
        if self.index.contains_key(descriptor.name()) {
            let err = ConfigError::DuplicateName {
                name: descriptor.name().to_string(),
            };
            error!(target: "emu_mcp::registry", name = descriptor.name(), "Duplicate capability name");
            return Err(err);
        }

        debug!(
            target: "emu_mcp::registry",
            name = descriptor.name(),
            kind = descriptor.kind().as_str(),
            params = descriptor.schema().len(),
            "Registered capability"
        );
        self.index
            .insert(descriptor.name().to_string(), self.entries.len());
        self.entries.push(descriptor);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            entries: self.entries,
            index: self.index,
        }
    }
}

fn validate_descriptor(descriptor: &CapabilityDescriptor) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidDescriptor {
        name: descriptor.name().to_string(),
        message: message.to_string(),
    };

    if descriptor.name().trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if descriptor.kind() == CapabilityKind::Resource && !descriptor.schema().is_empty() {
        return Err(invalid("resources cannot declare parameters"));
    }
    let mut seen = HashSet::new();
    for (param, spec) in descriptor.schema().iter() {
        if param.trim().is_empty() {
            return Err(invalid("parameter names must not be empty"));
        }
        if !seen.insert(param) {
            return Err(invalid(&format!("parameter `{param}` is declared twice")));
        }
        if let Some(default) = &spec.default {
            if spec.required {
                return Err(invalid(&format!(
                    "required parameter `{param}` cannot have a default"
                )));
            }
            if !spec.primitive.matches(default) {
                return Err(invalid(&format!(
                    "default for `{param}` is not a {}",
                    spec.primitive.as_str()
                )));
            }
        }
    }
    Ok(())
}

/// Frozen capability table.
#[derive(Debug)]
pub struct CapabilityRegistry {
    entries: Vec<CapabilityDescriptor>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    /// Exact match on name and kind.
    pub fn resolve(
        &self,
        name: &str,
        kind: CapabilityKind,
    ) -> Result<&CapabilityDescriptor, LookupError> {
        self.index
            .get(name)
            .map(|&slot| &self.entries[slot])
            .filter(|descriptor| descriptor.kind() == kind)
            .ok_or_else(|| LookupError::NotFound {
                name: name.to_string(),
                kind,
            })
    }

    /// All descriptors in registration order.
    pub fn list(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.entries.iter()
    }

    pub fn list_kind(&self, kind: CapabilityKind) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.entries
            .iter()
            .filter(move |descriptor| descriptor.kind() == kind)
    }

    pub fn summaries(&self) -> Vec<CapabilitySummary> {
        self.entries
            .iter()
            .map(CapabilityDescriptor::summary)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
