use std::{fmt, future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::schema::{InputSchema, ParamSpec};
use crate::server::auth::Identity;

/// Kinds of capability a client can invoke.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    #[default]
    Tool,
    Resource,
    Prompt,
}

impl CapabilityKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Tool => "tool",
            CapabilityKind::Resource => "resource",
            CapabilityKind::Prompt => "prompt",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a handler receives for one invocation.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Validated arguments, with declared defaults filled in.
    pub arguments: Map<String, Value>,
    pub identity: Identity,
    /// Cancelled when the caller goes away or the handler times out.
    pub cancellation: CancellationToken,
}

impl InvocationContext {
    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(Value::as_str)
    }
}

/// Boxed future returned by every handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'static>>;

/// Capability implementation invoked by the dispatcher.
pub trait CapabilityHandler: Send + Sync + 'static {
    fn call(&self, context: InvocationContext) -> HandlerFuture;
}

impl<F, Fut> CapabilityHandler for F
where
    F: Fn(InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn call(&self, context: InvocationContext) -> HandlerFuture {
        Box::pin(self(context))
    }
}

/// A registered capability: identity, declared inputs and handler.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    name: String,
    kind: CapabilityKind,
    description: String,
    schema: InputSchema,
    handler: Arc<dyn CapabilityHandler>,
}

impl CapabilityDescriptor {
    pub fn new(
        kind: CapabilityKind,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl CapabilityHandler,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            schema: InputSchema::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn tool(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl CapabilityHandler,
    ) -> Self {
        Self::new(CapabilityKind::Tool, name, description, handler)
    }

    /// Resources are addressed by URI and take no arguments.
    pub fn resource(
        uri: impl Into<String>,
        description: impl Into<String>,
        handler: impl CapabilityHandler,
    ) -> Self {
        Self::new(CapabilityKind::Resource, uri, description, handler)
    }

    pub fn prompt(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl CapabilityHandler,
    ) -> Self {
        Self::new(CapabilityKind::Prompt, name, description, handler)
    }

    /// Declare a parameter. Declaration order is kept for schema export.
    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.schema.push(name.into(), spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &InputSchema {
        &self.schema
    }

    pub fn handler(&self) -> Arc<dyn CapabilityHandler> {
        Arc::clone(&self.handler)
    }

    pub fn summary(&self) -> CapabilitySummary {
        CapabilitySummary {
            name: self.name.clone(),
            kind: self.kind,
            description: self.description.clone(),
            schema: Value::Object(self.schema.to_json_schema()),
        }
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Introspection row for one capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilitySummary {
    pub name: String,
    pub kind: CapabilityKind,
    pub description: String,
    pub schema: Value,
}
