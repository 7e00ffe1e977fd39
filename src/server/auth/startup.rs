//! Credential check performed before the stdio transport starts.
use std::process::ExitCode;

use serde_json::json;

use super::{CredentialVerifier, Identity};
use crate::{cli::TokenSource, lib::errors::AuthError, server::runtime::RuntimeExit};

/// Token supplied at launch for the stdio transport.
#[derive(Debug, Clone)]
pub struct StdioCredential {
    pub token: Option<String>,
    pub source: TokenSource,
}

impl StdioCredential {
    pub fn new(token: Option<String>, source: TokenSource) -> Self {
        Self { token, source }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// Verify the launch token, mapping each rejection onto a process exit code.
///
/// 43 when no token was supplied, 45 when signing keys cannot be loaded,
/// 42 for every other rejection.
pub async fn authenticate_stdio_launch(
    verifier: &CredentialVerifier,
    credential: &StdioCredential,
) -> Result<Identity, RuntimeExit> {
    verifier
        .verify(credential.token())
        .await
        .map_err(|err| launch_exit(&err, credential.source))
}

fn launch_exit(err: &AuthError, source: TokenSource) -> RuntimeExit {
    let exit_code: u8 = match err {
        AuthError::MissingToken => 43,
        AuthError::KeySourceUnavailable { .. } => 45,
        _ => 42,
    };
    let built = err
        .descriptor()
        .builder()
        .retryable(err.is_transient())
        .message(err.to_string())
        .details(json!({
            "token_source": source.as_str(),
            "exit_code": exit_code,
        }))
        .build();
    match built {
        Ok(body) => RuntimeExit::structured(body.to_error_data(), ExitCode::from(exit_code)),
        Err(builder_err) => RuntimeExit::from_error(builder_err),
    }
}
