use std::path::PathBuf;

use config::ConfigError as ConfigLoaderError;
use rmcp::model::{ErrorCode, ErrorData};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur while loading configuration or building the capability registry.
///
/// Every variant is fatal at startup: the server must not accept traffic with a
/// misconfigured registry or an invalid configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to build (read) the configuration file.
    #[error("Failed to read configuration file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Failed to deserialize TOML into a struct.
    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ConfigLoaderError,
    },
    /// Required field is missing.
    #[error("Configuration file {path} is missing `{field}`")]
    MissingField { path: PathBuf, field: &'static str },
    /// Field failed validation.
    #[error("Configuration file {path} has invalid `{field}`: {message}")]
    InvalidField {
        path: PathBuf,
        field: &'static str,
        message: String,
    },
    /// A capability with the same name was already registered.
    #[error("Capability `{name}` is already registered")]
    DuplicateName { name: String },
    /// A capability descriptor is structurally invalid.
    #[error("Capability `{name}` is invalid: {message}")]
    InvalidDescriptor { name: String, message: String },
}

impl ConfigError {
    /// Helper to wrap `config::ConfigError` as a read failure.
    pub fn from_read_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::FileRead { path, source }
    }

    /// Helper to wrap `config::ConfigError` as a parse failure.
    pub fn from_parse_error(path: PathBuf, source: ConfigLoaderError) -> Self {
        Self::Parse { path, source }
    }
}

/// Reasons a bearer token is rejected by the credential verifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("bearer token is missing")]
    MissingToken,
    #[error("bearer token is malformed: {reason}")]
    MalformedToken { reason: String },
    #[error("bearer token signature is invalid: {reason}")]
    SignatureInvalid { reason: String },
    #[error("bearer token has expired")]
    Expired,
    #[error("bearer token issuer does not match the configured issuer")]
    IssuerMismatch,
    #[error("bearer token audience does not match the configured audience")]
    AudienceMismatch,
    #[error("signing key source is unavailable: {reason}")]
    KeySourceUnavailable { reason: String },
}

impl AuthError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        self.descriptor().code
    }

    /// `true` for infrastructure failures the caller may retry later.
    pub const fn is_transient(&self) -> bool {
        matches!(self, AuthError::KeySourceUnavailable { .. })
    }

    pub const fn descriptor(&self) -> &'static FailureDescriptor {
        match self {
            AuthError::MissingToken => &MISSING_TOKEN_ERROR,
            AuthError::MalformedToken { .. } => &MALFORMED_TOKEN_ERROR,
            AuthError::SignatureInvalid { .. } => &SIGNATURE_INVALID_ERROR,
            AuthError::Expired => &TOKEN_EXPIRED_ERROR,
            AuthError::IssuerMismatch => &ISSUER_MISMATCH_ERROR,
            AuthError::AudienceMismatch => &AUDIENCE_MISMATCH_ERROR,
            AuthError::KeySourceUnavailable { .. } => &KEY_SOURCE_UNAVAILABLE_ERROR,
        }
    }
}

/// Failures while fetching a JSON Web Key Set from its source.
#[derive(Debug, Error)]
pub enum KeySourceError {
    #[error("JWKS request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("JWKS endpoint {url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to read JWKS file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JWKS document is invalid: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
    #[error("JWKS document contains no usable signing keys")]
    Empty,
}

/// Failure category attached to every structured failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Authentication,
    Lookup,
    Validation,
    Handler,
    Request,
}

impl FailureCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Authentication => "authentication",
            FailureCategory::Lookup => "lookup",
            FailureCategory::Validation => "validation",
            FailureCategory::Handler => "handler",
            FailureCategory::Request => "request",
        }
    }
}

/// Static error metadata shared by every transport.
#[derive(Debug, Clone, Serialize)]
pub struct FailureDescriptor {
    /// Error code.
    pub code: &'static str,
    /// Category used by clients to group failures.
    pub category: FailureCategory,
    /// User-facing message.
    pub message: &'static str,
    /// Recommended remediation.
    pub remediation: &'static str,
}

impl FailureDescriptor {
    pub const fn new(
        code: &'static str,
        category: FailureCategory,
        message: &'static str,
        remediation: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            message,
            remediation,
        }
    }

    /// Create a builder.
    pub fn builder(&self) -> FailureBodyBuilder<'_> {
        FailureBodyBuilder::new(self)
    }
}

/// Serialized `error` object of a failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureBody {
    pub code: &'static str,
    pub category: FailureCategory,
    pub message: String,
    pub remediation: &'static str,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl FailureBody {
    /// Convert into MCP `ErrorData`, keeping the structured fields under `data`.
    pub fn to_error_data(&self) -> ErrorData {
        let mut data = Map::new();
        data.insert("code".into(), Value::String(self.code.into()));
        data.insert(
            "category".into(),
            Value::String(self.category.as_str().into()),
        );
        data.insert(
            "remediation".into(),
            Value::String(self.remediation.into()),
        );
        data.insert("retryable".into(), Value::Bool(self.retryable));
        if let Some(details) = &self.details {
            data.insert("details".into(), details.clone());
        }
        let code = match self.category {
            FailureCategory::Lookup => ErrorCode::RESOURCE_NOT_FOUND,
            FailureCategory::Validation | FailureCategory::Request => ErrorCode::INVALID_PARAMS,
            FailureCategory::Authentication => ErrorCode(-32001),
            FailureCategory::Handler => ErrorCode::INTERNAL_ERROR,
        };
        ErrorData::new(code, self.message.clone(), Some(Value::Object(data)))
    }
}

/// Builder that refuses to produce a failure body without the required fields.
pub struct FailureBodyBuilder<'a> {
    descriptor: &'a FailureDescriptor,
    retryable: Option<bool>,
    message: Option<String>,
    details: Option<Value>,
}

impl<'a> FailureBodyBuilder<'a> {
    pub fn new(descriptor: &'a FailureDescriptor) -> Self {
        Self {
            descriptor,
            retryable: None,
            message: None,
            details: None,
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    /// Replace the descriptor's default message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn build(self) -> Result<FailureBody, FailureBuilderError> {
        if self.descriptor.remediation.trim().is_empty() {
            return Err(FailureBuilderError::MissingRemediation {
                code: self.descriptor.code,
            });
        }
        let retryable = self.retryable.ok_or(FailureBuilderError::MissingRetryable {
            code: self.descriptor.code,
        })?;

        Ok(FailureBody {
            code: self.descriptor.code,
            category: self.descriptor.category,
            message: self
                .message
                .unwrap_or_else(|| self.descriptor.message.to_string()),
            remediation: self.descriptor.remediation,
            retryable,
            details: self.details,
        })
    }
}

/// Errors when required builder fields are missing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FailureBuilderError {
    #[error("retryable is missing (code={code})")]
    MissingRetryable { code: &'static str },
    #[error("remediation is empty (code={code})")]
    MissingRemediation { code: &'static str },
}

pub const MISSING_TOKEN_ERROR: FailureDescriptor = FailureDescriptor::new(
    "missing_token",
    FailureCategory::Authentication,
    "A bearer token is required",
    "Send `Authorization: Bearer <jwt>` issued by the configured identity provider.",
);

pub const MALFORMED_TOKEN_ERROR: FailureDescriptor = FailureDescriptor::new(
    "malformed_token",
    FailureCategory::Authentication,
    "The bearer token is not a well-formed JWT",
    "Obtain a fresh token from the identity provider; do not modify it in transit.",
);

pub const SIGNATURE_INVALID_ERROR: FailureDescriptor = FailureDescriptor::new(
    "signature_invalid",
    FailureCategory::Authentication,
    "The bearer token signature could not be verified",
    "Use a token signed by a key published in the configured JWKS.",
);

pub const TOKEN_EXPIRED_ERROR: FailureDescriptor = FailureDescriptor::new(
    "token_expired",
    FailureCategory::Authentication,
    "The bearer token has expired",
    "Refresh the token and retry the request.",
);

pub const ISSUER_MISMATCH_ERROR: FailureDescriptor = FailureDescriptor::new(
    "issuer_mismatch",
    FailureCategory::Authentication,
    "The bearer token was issued by an untrusted issuer",
    "Request a token from the issuer configured in [auth].issuer.",
);

pub const AUDIENCE_MISMATCH_ERROR: FailureDescriptor = FailureDescriptor::new(
    "audience_mismatch",
    FailureCategory::Authentication,
    "The bearer token was not issued for this server",
    "Request a token whose audience matches [auth].audience.",
);

pub const KEY_SOURCE_UNAVAILABLE_ERROR: FailureDescriptor = FailureDescriptor::new(
    "key_source_unavailable",
    FailureCategory::Authentication,
    "Signing keys could not be loaded; the token was not evaluated",
    "Retry later; check reachability of [auth].jwks_uri.",
);

pub const CAPABILITY_NOT_FOUND_ERROR: FailureDescriptor = FailureDescriptor::new(
    "not_found",
    FailureCategory::Lookup,
    "No capability with that name and kind is registered",
    "List available capabilities via GET /capabilities and retry with an exact name.",
);

pub const VALIDATION_ERROR: FailureDescriptor = FailureDescriptor::new(
    "validation_error",
    FailureCategory::Validation,
    "Arguments do not match the capability input schema",
    "Fix the parameters listed in `details.issues` and retry.",
);

pub const HANDLER_ERROR: FailureDescriptor = FailureDescriptor::new(
    "handler_error",
    FailureCategory::Handler,
    "capability handler failed",
    "Retry later; contact the operator if the failure persists.",
);

pub const HANDLER_TIMEOUT_ERROR: FailureDescriptor = FailureDescriptor::new(
    "timeout",
    FailureCategory::Handler,
    "capability handler did not finish in time",
    "Retry later or narrow the request.",
);

pub const INVALID_REQUEST_ERROR: FailureDescriptor = FailureDescriptor::new(
    "invalid_request",
    FailureCategory::Request,
    "The request body could not be parsed",
    "Send a JSON object with `name`, optional `kind`, and optional `arguments`.",
);
