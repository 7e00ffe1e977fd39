use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, Validation};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    identity::Identity,
    keys::{FileKeySource, HttpKeySource, KeyCache, KeySource},
};
use crate::{
    lib::{errors::AuthError, telemetry::token_fingerprint},
    server::config::{AuthSection, KeySourceSpec},
};

/// Claims checked by the verifier itself.
#[derive(Debug, Deserialize)]
struct PeekedClaims {
    sub: Option<String>,
    exp: Option<i64>,
}

/// Claims extracted after full validation.
#[derive(Debug, Deserialize)]
struct VerifiedClaims {
    sub: String,
    iss: String,
    exp: i64,
}

/// Expected token properties.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub issuer: String,
    pub audience: String,
    pub algorithms: Vec<Algorithm>,
    pub leeway_secs: u64,
}

/// Validates bearer tokens against the configured key set, issuer and audience.
pub struct CredentialVerifier {
    keys: KeyCache,
    settings: VerifierSettings,
}

impl CredentialVerifier {
    pub fn new(keys: KeyCache, settings: VerifierSettings) -> Self {
        Self { keys, settings }
    }

    /// Build a verifier and its key source from the `[auth]` section.
    pub fn from_config(auth: &AuthSection) -> anyhow::Result<Self> {
        let source: Arc<dyn KeySource> = match &auth.key_source {
            KeySourceSpec::Remote { uri } => {
                Arc::new(HttpKeySource::new(uri.clone(), auth.jwks_fetch_timeout)?)
            }
            KeySourceSpec::File { path } => Arc::new(FileKeySource::new(path.clone())),
        };
        let keys = KeyCache::new(source, auth.jwks_cache_ttl);
        Ok(Self::new(
            keys,
            VerifierSettings {
                issuer: auth.issuer.clone(),
                audience: auth.audience.clone(),
                algorithms: auth.algorithms.clone(),
                leeway_secs: auth.leeway_secs,
            },
        ))
    }

    pub fn key_cache(&self) -> &KeyCache {
        &self.keys
    }

    /// Verify a bearer token and return the caller identity.
    ///
    /// Structure and expiry are checked from the decoded claims before any
    /// key lookup, so an expired token is reported as `Expired` whatever its
    /// signature.
    pub async fn verify(&self, bearer: Option<&str>) -> Result<Identity, AuthError> {
        let token = bearer
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let result = self.verify_token(token).await;
        match &result {
            Ok(identity) => debug!(
                target: "emu_mcp::auth",
                subject = identity.subject(),
                token = %token_fingerprint(token),
                "Bearer token verified"
            ),
            Err(err) => warn!(
                target: "emu_mcp::auth",
                code = err.code(),
                token = %token_fingerprint(token),
                reason = %err,
                "Bearer token rejected"
            ),
        }
        result
    }

    async fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        let peeked = peek_claims(token)?;
        let header = decode_header(token).map_err(|err| malformed(err.to_string()))?;

        let subject_present = peeked.sub.as_deref().is_some_and(|sub| !sub.is_empty());
        if !subject_present {
            return Err(malformed("missing `sub` claim"));
        }
        let exp = peeked.exp.ok_or_else(|| malformed("missing `exp` claim"))?;
        let now = Utc::now().timestamp();
        let leeway = i64::try_from(self.settings.leeway_secs).unwrap_or(i64::MAX);
        if exp < now.saturating_sub(leeway) {
            return Err(AuthError::Expired);
        }
        if !self.settings.algorithms.contains(&header.alg) {
            return Err(malformed(format!(
                "algorithm {:?} is not accepted",
                header.alg
            )));
        }

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| malformed("missing `kid` header"))?;
        let key = self.keys.resolve(kid).await?;
        if key.algorithm.is_some_and(|pinned| pinned != header.alg) {
            return Err(AuthError::SignatureInvalid {
                reason: "token algorithm does not match the signing key".into(),
            });
        }

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.settings.issuer.as_str()]);
        validation.set_audience(&[self.settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.leeway = self.settings.leeway_secs;

        let data = decode::<VerifiedClaims>(token, &key.decoding_key, &validation)
            .map_err(|err| classify(err.kind()))?;
        let claims = data.claims;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| malformed("`exp` is out of range"))?;

        Ok(Identity::new(claims.sub, claims.iss, expires_at))
    }
}

fn peek_claims(token: &str) -> Result<PeekedClaims, AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|segment| segment.is_empty()) {
        return Err(malformed("expected three dot-separated segments"));
    }
    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|err| malformed(format!("claims are not base64url: {err}")))?;
    serde_json::from_slice(&payload).map_err(|err| malformed(format!("claims are not JSON: {err}")))
}

fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
        ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => AuthError::IssuerMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => AuthError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) => malformed(format!("missing `{claim}` claim")),
        ErrorKind::ImmatureSignature => malformed("token is not valid yet (`nbf`)"),
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => malformed(format!("{kind:?}")),
        other => AuthError::SignatureInvalid {
            reason: format!("{other:?}"),
        },
    }
}

fn malformed(reason: impl Into<String>) -> AuthError {
    AuthError::MalformedToken {
        reason: reason.into(),
    }
}
