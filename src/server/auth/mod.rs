//! Bearer token verification.
mod identity;
pub mod keys;
mod startup;
#[cfg(test)]
pub(crate) mod test_support;
mod verifier;

use http::{header::AUTHORIZATION, HeaderMap};

pub use identity::Identity;
pub use keys::{FileKeySource, HttpKeySource, Jwk, JwkSet, KeyCache, KeySource};
pub use startup::{authenticate_stdio_launch, StdioCredential};
pub use verifier::{CredentialVerifier, VerifierSettings};

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// Returns `None` when the header is absent, not UTF-8, or uses another scheme.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
}
