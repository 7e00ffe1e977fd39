//! Capability dispatch: resolve, validate, run the handler, package the result.
use std::{sync::Arc, time::Duration};

use serde_json::{Map, Value};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn, Instrument};
use uuid::Uuid;

use crate::{
    lib::telemetry::InvocationSpan,
    server::{
        auth::Identity,
        registry::{CapabilityKind, CapabilityRegistry, InvocationContext},
    },
};

mod outcome;
mod validate;

pub use outcome::{FailureKind, InvocationFailure, InvocationResult};
pub use validate::{validate_arguments, IssueKind, ValidationIssue};

/// One authenticated call.
///
/// Constructing a request needs an [`Identity`], which only the credential
/// verifier hands out.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub name: String,
    pub kind: CapabilityKind,
    pub arguments: Map<String, Value>,
    pub identity: Identity,
}

/// Runs capability handlers on behalf of verified callers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    handler_timeout: Duration,
}

type HandlerJoin = Result<anyhow::Result<Value>, JoinError>;

/// Cancels the token and aborts the task if the invocation is abandoned.
struct HandlerTask {
    handle: JoinHandle<anyhow::Result<Value>>,
    cancellation: CancellationToken,
}

impl HandlerTask {
    async fn join(&mut self) -> HandlerJoin {
        (&mut self.handle).await
    }

    fn stop(&self) {
        self.cancellation.cancel();
        self.handle.abort();
    }
}

impl Drop for HandlerTask {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            self.stop();
        }
    }
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>, handler_timeout: Duration) -> Self {
        Self {
            registry,
            handler_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Invoke a capability. Never retries.
    pub async fn invoke(&self, request: InvocationRequest) -> InvocationResult {
        let invocation_id = Uuid::new_v4();
        let span = InvocationSpan::start(invocation_id, &request.name, request.kind.as_str());
        let result = self.run(request).instrument(span.span().clone()).await;
        span.finish(result.status_label());
        result
    }

    async fn run(&self, request: InvocationRequest) -> InvocationResult {
        let InvocationRequest {
            name,
            kind,
            arguments,
            identity,
        } = request;

        let descriptor = match self.registry.resolve(&name, kind) {
            Ok(descriptor) => descriptor,
            Err(err) => return InvocationFailure::not_found(&err).into(),
        };

        let arguments = match validate_arguments(descriptor.schema(), arguments) {
            Ok(arguments) => arguments,
            Err(issues) => {
                warn!(
                    target: "emu_mcp::dispatch",
                    capability = %name,
                    issues = issues.len(),
                    "Rejected invocation arguments"
                );
                return InvocationFailure::validation(issues).into();
            }
        };

        let cancellation = CancellationToken::new();
        let context = InvocationContext {
            arguments,
            identity,
            cancellation: cancellation.clone(),
        };
        let handler = descriptor.handler();
        let mut task = HandlerTask {
            handle: tokio::spawn(async move { handler.call(context).await }.in_current_span()),
            cancellation,
        };

        match tokio::time::timeout(self.handler_timeout, task.join()).await {
            Ok(Ok(Ok(payload))) => InvocationResult::Success(payload),
            Ok(Ok(Err(err))) => {
                error!(
                    target: "emu_mcp::dispatch",
                    capability = %name,
                    error = %format!("{err:#}"),
                    "Capability handler returned an error"
                );
                InvocationFailure::handler().into()
            }
            Ok(Err(join_err)) => {
                error!(
                    target: "emu_mcp::dispatch",
                    capability = %name,
                    panicked = join_err.is_panic(),
                    error = %join_err,
                    "Capability handler task failed"
                );
                InvocationFailure::handler().into()
            }
            Err(_elapsed) => {
                task.stop();
                warn!(
                    target: "emu_mcp::dispatch",
                    capability = %name,
                    timeout_secs = self.handler_timeout.as_secs(),
                    "Capability handler timed out"
                );
                InvocationFailure::timeout(self.handler_timeout.as_secs()).into()
            }
        }
    }
}
