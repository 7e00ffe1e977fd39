use std::{path::Path, path::PathBuf, time::Duration};

use jsonwebtoken::Algorithm;
use serde::Deserialize;

use crate::lib::errors::ConfigError;

pub const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LEEWAY_SECS: u64 = 30;
pub const DEFAULT_ALGORITHMS: &[Algorithm] = &[Algorithm::RS256];

/// Where the verifier loads its signing keys from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySourceSpec {
    /// Published JWKS endpoint.
    Remote { uri: String },
    /// JWKS document on local disk.
    File { path: PathBuf },
}

/// Bearer-token verification settings.
#[derive(Debug, Clone)]
pub struct AuthSection {
    pub key_source: KeySourceSpec,
    pub issuer: String,
    pub audience: String,
    pub algorithms: Vec<Algorithm>,
    pub jwks_cache_ttl: Duration,
    pub jwks_fetch_timeout: Duration,
    pub leeway_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct RawAuthSection {
    pub jwks_uri: Option<String>,
    pub jwks_path: Option<PathBuf>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub algorithms: Option<Vec<String>>,
    pub jwks_cache_ttl_secs: Option<u64>,
    pub jwks_fetch_timeout_secs: Option<u64>,
    pub leeway_secs: Option<u64>,
}

pub fn parse_auth_section(
    raw: Option<RawAuthSection>,
    path: &Path,
) -> Result<AuthSection, ConfigError> {
    let auth_raw = raw.ok_or(ConfigError::MissingField {
        path: path.to_path_buf(),
        field: "auth",
    })?;

    let key_source = parse_key_source(auth_raw.jwks_uri, auth_raw.jwks_path, path)?;
    let issuer = required_string(auth_raw.issuer, "auth.issuer", path)?;
    let audience = required_string(auth_raw.audience, "auth.audience", path)?;
    let algorithms = parse_algorithms(auth_raw.algorithms, path)?;

    let jwks_cache_ttl_secs = auth_raw
        .jwks_cache_ttl_secs
        .unwrap_or(DEFAULT_JWKS_CACHE_TTL_SECS);
    let jwks_fetch_timeout_secs = auth_raw
        .jwks_fetch_timeout_secs
        .unwrap_or(DEFAULT_JWKS_FETCH_TIMEOUT_SECS);
    if jwks_fetch_timeout_secs == 0 {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "auth.jwks_fetch_timeout_secs",
            message: "Use a timeout of at least 1 second".into(),
        });
    }

    Ok(AuthSection {
        key_source,
        issuer,
        audience,
        algorithms,
        jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
        jwks_fetch_timeout: Duration::from_secs(jwks_fetch_timeout_secs),
        leeway_secs: auth_raw.leeway_secs.unwrap_or(DEFAULT_LEEWAY_SECS),
    })
}

fn parse_key_source(
    jwks_uri: Option<String>,
    jwks_path: Option<PathBuf>,
    path: &Path,
) -> Result<KeySourceSpec, ConfigError> {
    let jwks_uri = jwks_uri.filter(|value| !value.trim().is_empty());
    match (jwks_uri, jwks_path) {
        (Some(_), Some(_)) => Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "auth.jwks_uri",
            message: "Set either jwks_uri or jwks_path, not both".into(),
        }),
        (Some(uri), None) => {
            if !(uri.starts_with("https://") || uri.starts_with("http://")) {
                return Err(ConfigError::InvalidField {
                    path: path.to_path_buf(),
                    field: "auth.jwks_uri",
                    message: "Use an http(s) URL".into(),
                });
            }
            Ok(KeySourceSpec::Remote { uri })
        }
        (None, Some(jwks_path)) => {
            let resolved = if jwks_path.is_absolute() {
                jwks_path
            } else {
                path.parent()
                    .map(|dir| dir.join(&jwks_path))
                    .unwrap_or(jwks_path)
            };
            Ok(KeySourceSpec::File { path: resolved })
        }
        (None, None) => Err(ConfigError::MissingField {
            path: path.to_path_buf(),
            field: "auth.jwks_uri",
        }),
    }
}

fn parse_algorithms(
    raw: Option<Vec<String>>,
    path: &Path,
) -> Result<Vec<Algorithm>, ConfigError> {
    let Some(names) = raw else {
        return Ok(DEFAULT_ALGORITHMS.to_vec());
    };
    if names.is_empty() {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "auth.algorithms",
            message: "List at least one signing algorithm".into(),
        });
    }

    names
        .iter()
        .map(|name| {
            let algorithm: Algorithm =
                name.parse().map_err(|_| ConfigError::InvalidField {
                    path: path.to_path_buf(),
                    field: "auth.algorithms",
                    message: format!("Unknown algorithm `{name}`"),
                })?;
            if matches!(
                algorithm,
                Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
            ) {
                return Err(ConfigError::InvalidField {
                    path: path.to_path_buf(),
                    field: "auth.algorithms",
                    message: format!("Symmetric algorithm `{name}` cannot be used with a JWKS"),
                });
            }
            Ok(algorithm)
        })
        .collect()
}

fn required_string(
    value: Option<String>,
    field: &'static str,
    path: &Path,
) -> Result<String, ConfigError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingField {
            path: path.to_path_buf(),
            field,
        })
}
