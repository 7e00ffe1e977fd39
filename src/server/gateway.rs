//! The server instance: credential verification followed by dispatch.
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    lib::errors::AuthError,
    server::{
        auth::{CredentialVerifier, Identity},
        dispatch::{Dispatcher, InvocationFailure, InvocationRequest, InvocationResult},
        registry::{CapabilityKind, CapabilityRegistry},
    },
};

/// A call as received from a transport, before authentication.
#[derive(Debug, Clone)]
pub struct CapabilityCall {
    pub name: String,
    pub kind: CapabilityKind,
    pub arguments: Map<String, Value>,
}

impl CapabilityCall {
    pub fn new(name: impl Into<String>, kind: CapabilityKind, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            arguments,
        }
    }

    pub fn tool(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self::new(name, CapabilityKind::Tool, arguments)
    }
}

/// Owned server state shared by every transport through an `Arc`.
pub struct Gateway {
    verifier: CredentialVerifier,
    dispatcher: Dispatcher,
}

impl Gateway {
    pub fn new(verifier: CredentialVerifier, dispatcher: Dispatcher) -> Self {
        Self {
            verifier,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        self.dispatcher.registry()
    }

    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<Identity, AuthError> {
        self.verifier.verify(bearer).await
    }

    /// Verify the bearer token, then invoke. A rejected token never reaches a handler.
    pub async fn handle(&self, bearer: Option<&str>, call: CapabilityCall) -> InvocationResult {
        match self.authenticate(bearer).await {
            Ok(identity) => self.invoke(identity, call).await,
            Err(err) => InvocationFailure::unauthenticated(err).into(),
        }
    }

    /// Invoke on behalf of an already verified caller.
    pub async fn invoke(&self, identity: Identity, call: CapabilityCall) -> InvocationResult {
        self.dispatcher
            .invoke(InvocationRequest {
                name: call.name,
                kind: call.kind,
                arguments: call.arguments,
                identity,
            })
            .await
    }
}
