//! Uniform invocation results shared by every transport.
use http::StatusCode;
use serde_json::{json, Value};
use tracing::error;

use super::validate::ValidationIssue;
use crate::{
    lib::errors::{
        AuthError, FailureBody, FailureDescriptor, CAPABILITY_NOT_FOUND_ERROR, HANDLER_ERROR,
        HANDLER_TIMEOUT_ERROR, INVALID_REQUEST_ERROR, VALIDATION_ERROR,
    },
    server::registry::LookupError,
};

/// Why an invocation did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    Unauthenticated(AuthError),
    InvalidRequest,
    NotFound,
    Validation,
    Handler,
    Timeout,
}

impl FailureKind {
    /// Label recorded on invocation spans.
    pub const fn status_label(&self) -> &'static str {
        match self {
            FailureKind::Unauthenticated(_) => "unauthenticated",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::NotFound => "not_found",
            FailureKind::Validation => "validation_error",
            FailureKind::Handler => "handler_error",
            FailureKind::Timeout => "timeout",
        }
    }

    fn descriptor(&self) -> (&'static FailureDescriptor, bool) {
        match self {
            FailureKind::Unauthenticated(err) => (err.descriptor(), err.is_transient()),
            FailureKind::InvalidRequest => (&INVALID_REQUEST_ERROR, false),
            FailureKind::NotFound => (&CAPABILITY_NOT_FOUND_ERROR, false),
            FailureKind::Validation => (&VALIDATION_ERROR, false),
            FailureKind::Handler => (&HANDLER_ERROR, true),
            FailureKind::Timeout => (&HANDLER_TIMEOUT_ERROR, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvocationFailure {
    pub kind: FailureKind,
    pub message: String,
    pub details: Option<Value>,
}

impl InvocationFailure {
    pub fn unauthenticated(err: AuthError) -> Self {
        Self {
            message: err.to_string(),
            kind: FailureKind::Unauthenticated(err),
            details: None,
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InvalidRequest,
            message: INVALID_REQUEST_ERROR.message.to_string(),
            details: Some(json!({ "reason": reason.into() })),
        }
    }

    pub fn not_found(err: &LookupError) -> Self {
        let LookupError::NotFound { name, kind } = err;
        Self {
            kind: FailureKind::NotFound,
            message: err.to_string(),
            details: Some(json!({ "name": name, "kind": kind })),
        }
    }

    pub fn validation(issues: Vec<ValidationIssue>) -> Self {
        Self {
            kind: FailureKind::Validation,
            message: VALIDATION_ERROR.message.to_string(),
            details: Some(json!({ "issues": issues })),
        }
    }

    /// Handler failures are opaque to the caller.
    pub fn handler() -> Self {
        Self {
            kind: FailureKind::Handler,
            message: HANDLER_ERROR.message.to_string(),
            details: None,
        }
    }

    pub fn timeout(limit_secs: u64) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!("capability handler did not finish within {limit_secs}s"),
            details: Some(json!({ "timeout_secs": limit_secs })),
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match &self.kind {
            FailureKind::Unauthenticated(AuthError::KeySourceUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            FailureKind::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            FailureKind::InvalidRequest | FailureKind::Validation => StatusCode::BAD_REQUEST,
            FailureKind::NotFound => StatusCode::NOT_FOUND,
            FailureKind::Handler => StatusCode::INTERNAL_SERVER_ERROR,
            FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.kind, FailureKind::Unauthenticated(_))
    }

    /// Structured `error` object for envelopes and MCP error data.
    pub fn to_body(&self) -> FailureBody {
        let (descriptor, retryable) = self.kind.descriptor();
        let mut builder = descriptor
            .builder()
            .retryable(retryable)
            .message(self.message.clone());
        if let Some(details) = &self.details {
            builder = builder.details(details.clone());
        }
        match builder.build() {
            Ok(body) => body,
            Err(err) => {
                error!(target: "emu_mcp::dispatch", code = descriptor.code, reason = %err, "Failure descriptor is incomplete");
                FailureBody {
                    code: descriptor.code,
                    category: descriptor.category,
                    message: self.message.clone(),
                    remediation: descriptor.remediation,
                    retryable,
                    details: self.details.clone(),
                }
            }
        }
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(Value),
    Failure(InvocationFailure),
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    pub fn failure(&self) -> Option<&InvocationFailure> {
        match self {
            InvocationResult::Success(_) => None,
            InvocationResult::Failure(failure) => Some(failure),
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            InvocationResult::Success(_) => "success",
            InvocationResult::Failure(failure) => failure.kind.status_label(),
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            InvocationResult::Success(_) => StatusCode::OK,
            InvocationResult::Failure(failure) => failure.http_status(),
        }
    }

    /// `{ "status": "success", "payload": .. }` or `{ "status": "failure", "error": .. }`.
    pub fn to_envelope(&self) -> Value {
        match self {
            InvocationResult::Success(payload) => {
                json!({ "status": "success", "payload": payload })
            }
            InvocationResult::Failure(failure) => {
                json!({ "status": "failure", "error": failure.to_body() })
            }
        }
    }
}

impl From<InvocationFailure> for InvocationResult {
    fn from(failure: InvocationFailure) -> Self {
        InvocationResult::Failure(failure)
    }
}
