//! JSON Web Key Set sources and the shared signing-key cache.
//!
//! The cache is the only mutable state shared between requests. Readers take a
//! cheap snapshot under a `RwLock`; refreshes are serialized through an async
//! mutex so at most one fetch is in flight, and callers holding a stale but
//! still matching key keep serving with it while another caller refreshes.

use std::{
    collections::HashMap,
    future::Future,
    path::PathBuf,
    pin::Pin,
    sync::{Arc, PoisonError, RwLock},
    time::{Duration, Instant},
};

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::lib::errors::{AuthError, KeySourceError};

/// Minimum spacing between refreshes triggered by an unknown `kid`.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// A single JSON Web Key as published in a JWKS document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// A JWKS document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Parse a JWKS document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeySourceError> {
        serde_json::from_slice(bytes).map_err(|source| KeySourceError::Decode { source })
    }
}

/// Key material ready for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    pub kid: String,
    /// Algorithm pinned by the JWK `alg` member, if any.
    pub algorithm: Option<Algorithm>,
    pub decoding_key: DecodingKey,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Convert a signing JWK; returns `None` for encryption keys and
    /// unsupported key types.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        let kid = jwk.kid.clone()?;
        if jwk.key_use.as_deref().is_some_and(|usage| usage != "sig") {
            return None;
        }
        let algorithm = match jwk.alg.as_deref() {
            Some(name) => Some(name.parse::<Algorithm>().ok()?),
            None => None,
        };

        let decoding_key = match jwk.kty.as_str() {
            "RSA" => DecodingKey::from_rsa_components(jwk.n.as_deref()?, jwk.e.as_deref()?).ok()?,
            "EC" => DecodingKey::from_ec_components(jwk.x.as_deref()?, jwk.y.as_deref()?).ok()?,
            "OKP" => DecodingKey::from_ed_components(jwk.x.as_deref()?).ok()?,
            _ => return None,
        };

        Some(Self {
            kid,
            algorithm,
            decoding_key,
        })
    }
}

/// Future returned by [`KeySource::fetch`].
pub type KeySetFuture<'a> = Pin<Box<dyn Future<Output = Result<JwkSet, KeySourceError>> + Send + 'a>>;

/// Where signing keys come from.
pub trait KeySource: Send + Sync + 'static {
    /// Fetch the current key set.
    fn fetch(&self) -> KeySetFuture<'_>;

    /// Human-readable location used in logs.
    fn describe(&self) -> String;
}

/// Key source backed by a published JWKS endpoint.
pub struct HttpKeySource {
    url: String,
    client: reqwest::Client,
}

impl HttpKeySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl KeySource for HttpKeySource {
    fn fetch(&self) -> KeySetFuture<'_> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.url)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|source| KeySourceError::Request {
                    url: self.url.clone(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(KeySourceError::Status {
                    url: self.url.clone(),
                    status: status.as_u16(),
                });
            }

            let body = response
                .bytes()
                .await
                .map_err(|source| KeySourceError::Request {
                    url: self.url.clone(),
                    source,
                })?;
            JwkSet::from_slice(&body)
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Key source reading a JWKS document from disk on every refresh.
pub struct FileKeySource {
    path: PathBuf,
}

impl FileKeySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeySource for FileKeySource {
    fn fetch(&self) -> KeySetFuture<'_> {
        Box::pin(async move {
            let bytes = tokio::fs::read(&self.path)
                .await
                .map_err(|source| KeySourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            JwkSet::from_slice(&bytes)
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

struct KeySnapshot {
    keys: HashMap<String, Arc<VerificationKey>>,
    fetched_at: Instant,
}

impl KeySnapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

#[derive(Default)]
struct CacheState {
    snapshot: Option<Arc<KeySnapshot>>,
    /// Bumped on every refresh attempt, successful or not.
    attempts: u64,
    last_error: Option<String>,
}

/// Signing-key cache with stale-read-while-refresh and refresh coalescing.
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    min_refresh_interval: Duration,
    state: RwLock<CacheState>,
    refresh_gate: Mutex<()>,
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            state: RwLock::new(CacheState::default()),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Override how soon an unknown `kid` may trigger another fetch.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Number of fetches attempted so far (used by telemetry and tests).
    pub fn refresh_attempts(&self) -> u64 {
        self.read_state(|state| state.attempts)
    }

    /// Fetch eagerly at startup; failures are logged, not fatal.
    pub async fn prime(&self) {
        let _guard = self.refresh_gate.lock().await;
        if let Err(reason) = self.refresh().await {
            warn!(
                target: "emu_mcp::auth",
                source = %self.source.describe(),
                reason = %reason,
                "Initial JWKS fetch failed; will retry on first request"
            );
        }
    }

    /// Resolve the verification key for `kid`.
    pub async fn resolve(&self, kid: &str) -> Result<Arc<VerificationKey>, AuthError> {
        let (snapshot, attempts) = self.read_state(|state| (state.snapshot.clone(), state.attempts));

        if let Some(snapshot) = &snapshot {
            if let Some(key) = snapshot.keys.get(kid).cloned() {
                if snapshot.is_fresh(self.ttl) {
                    return Ok(key);
                }
                return Ok(self.refresh_stale(kid, key, attempts).await);
            }
            if snapshot.fetched_at.elapsed() < self.min_refresh_interval {
                return Err(unknown_kid(kid));
            }
        }

        let _guard = self.refresh_gate.lock().await;
        let (current_attempts, last_error) =
            self.read_state(|state| (state.attempts, state.last_error.clone()));
        if current_attempts == attempts {
            if let Err(reason) = self.refresh().await {
                return self.fallback_after_failure(kid, reason);
            }
        } else if let Some(reason) = last_error {
            debug!(
                target: "emu_mcp::auth",
                kid = kid,
                "Reusing outcome of a concurrent JWKS refresh that failed"
            );
            return self.fallback_after_failure(kid, reason);
        }

        self.lookup(kid).ok_or_else(|| unknown_kid(kid))
    }

    /// A stale key is served as-is unless this caller wins the refresh gate.
    async fn refresh_stale(
        &self,
        kid: &str,
        stale: Arc<VerificationKey>,
        attempts: u64,
    ) -> Arc<VerificationKey> {
        let Ok(_guard) = self.refresh_gate.try_lock() else {
            return stale;
        };
        if self.refresh_attempts() != attempts {
            return self.lookup(kid).unwrap_or(stale);
        }
        match self.refresh().await {
            Ok(()) => self.lookup(kid).unwrap_or(stale),
            Err(reason) => {
                warn!(
                    target: "emu_mcp::auth",
                    kid = kid,
                    reason = %reason,
                    "JWKS refresh failed; serving stale signing key"
                );
                stale
            }
        }
    }

    fn fallback_after_failure(
        &self,
        kid: &str,
        reason: String,
    ) -> Result<Arc<VerificationKey>, AuthError> {
        match self.lookup(kid) {
            Some(key) => Ok(key),
            None => Err(AuthError::KeySourceUnavailable { reason }),
        }
    }

    /// Fetch and swap the snapshot. Callers must hold `refresh_gate`.
    async fn refresh(&self) -> Result<(), String> {
        let outcome = self.source.fetch().await.and_then(|set| {
            let keys: HashMap<_, _> = set
                .keys
                .iter()
                .filter_map(VerificationKey::from_jwk)
                .map(|key| (key.kid.clone(), Arc::new(key)))
                .collect();
            if keys.is_empty() {
                Err(KeySourceError::Empty)
            } else {
                Ok(keys)
            }
        });

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.attempts += 1;
        match outcome {
            Ok(keys) => {
                info!(
                    target: "emu_mcp::auth",
                    source = %self.source.describe(),
                    keys = keys.len(),
                    "Refreshed JWKS signing keys"
                );
                state.snapshot = Some(Arc::new(KeySnapshot {
                    keys,
                    fetched_at: Instant::now(),
                }));
                state.last_error = None;
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(
                    target: "emu_mcp::auth",
                    source = %self.source.describe(),
                    reason = %reason,
                    "JWKS refresh failed"
                );
                state.last_error = Some(reason.clone());
                Err(reason)
            }
        }
    }

    fn lookup(&self, kid: &str) -> Option<Arc<VerificationKey>> {
        self.read_state(|state| {
            state
                .snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.keys.get(kid).cloned())
        })
    }

    fn read_state<T>(&self, read: impl FnOnce(&CacheState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        read(&state)
    }
}

fn unknown_kid(kid: &str) -> AuthError {
    AuthError::SignatureInvalid {
        reason: format!("no published signing key matches kid `{kid}`"),
    }
}
