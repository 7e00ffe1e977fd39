//! Token minting helpers shared by unit tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

use super::keys::{JwkSet, KeyCache, KeySetFuture, KeySource};
use super::verifier::{CredentialVerifier, VerifierSettings};
use crate::lib::errors::KeySourceError;

pub const TEST_KID: &str = "emu-test-key-1";
pub const TEST_ISSUER: &str = "https://auth.emu-test.local";
pub const TEST_AUDIENCE: &str = "emu-mcp-server";

const TEST_RSA_PRIVATE_PEM: &str = include_str!("../../../tests/fixtures/keys/test_rsa.pem");
const OTHER_RSA_PRIVATE_PEM: &str = include_str!("../../../tests/fixtures/keys/other_rsa.pem");
const TEST_JWKS: &str = include_str!("../../../tests/fixtures/keys/jwks.json");

#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub iss: String,
    pub aud: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub iat: i64,
}

pub fn valid_claims(subject: &str) -> TestClaims {
    let now = Utc::now().timestamp();
    TestClaims {
        sub: Some(subject.to_string()),
        iss: TEST_ISSUER.to_string(),
        aud: TEST_AUDIENCE.to_string(),
        exp: Some(now + 3600),
        iat: now,
    }
}

pub fn test_jwks() -> JwkSet {
    JwkSet::from_slice(TEST_JWKS.as_bytes()).expect("fixture JWKS must parse")
}

/// Sign with the key published in the fixture JWKS.
pub fn mint(claims: &TestClaims) -> String {
    sign_with(TEST_RSA_PRIVATE_PEM, Some(TEST_KID), claims)
}

/// Sign with a key that is NOT published, but claim the published `kid`.
pub fn mint_with_foreign_key(claims: &TestClaims) -> String {
    sign_with(OTHER_RSA_PRIVATE_PEM, Some(TEST_KID), claims)
}

pub fn sign_with(pem: &str, kid: Option<&str>, claims: &TestClaims) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture PEM must parse");
    encode(&header, claims, &key).expect("token must encode")
}

/// Key source serving the fixture JWKS from memory.
pub struct StaticKeySource(pub JwkSet);

impl KeySource for StaticKeySource {
    fn fetch(&self) -> KeySetFuture<'_> {
        let set = self.0.clone();
        Box::pin(async move { Ok(set) })
    }

    fn describe(&self) -> String {
        "static".into()
    }
}

pub fn test_verifier() -> CredentialVerifier {
    let cache = KeyCache::new(
        Arc::new(StaticKeySource(test_jwks())),
        Duration::from_secs(300),
    );
    CredentialVerifier::new(
        cache,
        VerifierSettings {
            issuer: TEST_ISSUER.to_string(),
            audience: TEST_AUDIENCE.to_string(),
            algorithms: vec![Algorithm::RS256],
            leeway_secs: 0,
        },
    )
}

/// Key source that is always unreachable.
pub struct UnavailableKeySource;

impl KeySource for UnavailableKeySource {
    fn fetch(&self) -> KeySetFuture<'_> {
        Box::pin(async { Err(KeySourceError::Empty) })
    }

    fn describe(&self) -> String {
        "unavailable".into()
    }
}
