//! Load and validate server configuration.
use std::{env, path::PathBuf};

use serde::Deserialize;
use tracing::{error, info};

use crate::lib::errors::ConfigError;

pub mod auth;
pub mod dispatch;
pub mod server;
pub mod telemetry;

pub use auth::{
    parse_auth_section, AuthSection, KeySourceSpec, RawAuthSection, DEFAULT_ALGORITHMS,
    DEFAULT_JWKS_CACHE_TTL_SECS, DEFAULT_JWKS_FETCH_TIMEOUT_SECS, DEFAULT_LEEWAY_SECS,
};
pub use dispatch::{
    parse_dispatch_section, DispatchSection, RawDispatchSection, DEFAULT_HANDLER_TIMEOUT_SECS,
};
pub use server::{
    parse_server_section, RawServerSection, ServerSection, DEFAULT_HOST, DEFAULT_MCP_PATH,
    DEFAULT_PORT,
};

const CONFIG_ENV_KEY: &str = "MCP_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level configuration container.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub dispatch: DispatchSection,
    pub source_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawServerConfig {
    server: Option<RawServerSection>,
    auth: Option<RawAuthSection>,
    dispatch: Option<RawDispatchSection>,
}

impl ServerConfig {
    /// Prefer `MCP_CONFIG_PATH` if set; otherwise read `config.toml`.
    pub fn load_from_env_or_default() -> Result<Self, ConfigError> {
        let (path, from_env) = match env::var(CONFIG_ENV_KEY) {
            Ok(value) if !value.trim().is_empty() => (PathBuf::from(value), true),
            _ => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        telemetry::log_env_source(&path, from_env);
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        info!(
            target: "emu_mcp::config",
            path = %path.display(),
            "Starting configuration load"
        );

        let builder = config::Config::builder().add_source(config::File::from(path.clone()));
        let document = builder.build().map_err(|err| {
            let error = ConfigError::from_read_error(path.clone(), err);
            error!(
                target: "emu_mcp::config",
                path = %path.display(),
                reason = %error,
                "Failed to read configuration file"
            );
            error
        })?;

        let raw: RawServerConfig = document.try_deserialize().map_err(|err| {
            let error = ConfigError::from_parse_error(path.clone(), err);
            error!(
                target: "emu_mcp::config",
                path = %path.display(),
                reason = %error,
                "Failed to parse configuration file"
            );
            error
        })?;

        let config = Self::from_raw(raw, path.clone()).map_err(|err| {
            error!(
                target: "emu_mcp::config",
                path = %path.display(),
                reason = %err,
                "Failed to validate configuration file"
            );
            err
        })?;

        telemetry::log_loaded(&config);
        Ok(config)
    }

    fn from_raw(raw: RawServerConfig, path: PathBuf) -> Result<Self, ConfigError> {
        let server = parse_server_section(raw.server, &path)?;
        let auth = parse_auth_section(raw.auth, &path)?;
        let dispatch = parse_dispatch_section(raw.dispatch, &path)?;

        Ok(Self {
            server,
            auth,
            dispatch,
            source_path: path,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        path::{Path, PathBuf},
        time::Duration,
    };

    use jsonwebtoken::Algorithm;

    use crate::lib::errors::ConfigError;

    use super::{KeySourceSpec, ServerConfig};

    fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    fn with_config_env<T>(path: &Path, test: impl FnOnce() -> T) -> T {
        let original = env::var(super::CONFIG_ENV_KEY).ok();
        env::set_var(super::CONFIG_ENV_KEY, path);
        let result = test();
        match original {
            Some(value) => env::set_var(super::CONFIG_ENV_KEY, value),
            None => env::remove_var(super::CONFIG_ENV_KEY),
        }
        result
    }

    #[test]
    fn load_valid_config() {
        let config = ServerConfig::load_from_path(fixture_path("config_valid.toml"))
            .expect("config_valid.toml should load");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.mcp_path, "/mcp");
        assert_eq!(
            config.auth.key_source,
            KeySourceSpec::Remote {
                uri: "https://your-company-auth.com/.well-known/jwks.json".into()
            }
        );
        assert_eq!(config.auth.issuer, "https://your-company-auth.com");
        assert_eq!(config.auth.audience, "emu-mcp-server");
        assert_eq!(config.auth.algorithms, vec![Algorithm::RS256]);
        assert_eq!(config.auth.jwks_cache_ttl, Duration::from_secs(600));
        assert_eq!(config.auth.leeway_secs, 30);
        assert_eq!(config.dispatch.handler_timeout, Duration::from_secs(15));
    }

    #[test]
    fn jwks_path_is_resolved_relative_to_config_file() {
        let config = ServerConfig::load_from_path(fixture_path("config_jwks_file.toml"))
            .expect("config_jwks_file.toml should load");

        assert_eq!(
            config.auth.key_source,
            KeySourceSpec::File {
                path: fixture_path("keys/jwks.json")
            }
        );
        assert_eq!(
            config.dispatch.handler_timeout,
            Duration::from_secs(super::DEFAULT_HANDLER_TIMEOUT_SECS)
        );
    }

    #[test]
    fn missing_issuer_returns_error() {
        let error = ServerConfig::load_from_path(fixture_path("config_missing_issuer.toml"))
            .expect_err("should error when issuer is missing");

        match error {
            ConfigError::MissingField { field, .. } => assert_eq!(field, "auth.issuer"),
            other => panic!("Unexpected error: {other:?}", other = other),
        }
    }

    #[test]
    fn missing_auth_section_returns_error() {
        let error = ServerConfig::load_from_path(fixture_path("config_missing_auth.toml"))
            .expect_err("should error when auth section is missing");

        match error {
            ConfigError::MissingField { field, .. } => assert_eq!(field, "auth"),
            other => panic!("Unexpected error: {other:?}", other = other),
        }
    }

    #[test]
    fn invalid_port_returns_error() {
        let error = ServerConfig::load_from_path(fixture_path("config_invalid_port.toml"))
            .expect_err("should error for an invalid port");

        match error {
            ConfigError::InvalidField { field, .. } => assert_eq!(field, "server.port"),
            other => panic!("Unexpected error: {other:?}", other = other),
        }
    }

    #[test]
    fn wildcard_mcp_path_is_rejected() {
        let error = ServerConfig::load_from_path(fixture_path("config_wildcard_mcp_path.toml"))
            .expect_err("should error for a wildcard MCP route");

        match error {
            ConfigError::InvalidField { field, .. } => assert_eq!(field, "server.mcp_path"),
            other => panic!("Unexpected error: {other:?}", other = other),
        }
    }

    #[test]
    fn both_key_sources_are_rejected() {
        let error = ServerConfig::load_from_path(fixture_path("config_both_key_sources.toml"))
            .expect_err("should error when jwks_uri and jwks_path are both set");

        match error {
            ConfigError::InvalidField { field, .. } => assert_eq!(field, "auth.jwks_uri"),
            other => panic!("Unexpected error: {other:?}", other = other),
        }
    }

    #[test]
    fn symmetric_algorithms_are_rejected() {
        let error = ServerConfig::load_from_path(fixture_path("config_hmac_algorithm.toml"))
            .expect_err("should error for HS256");

        match error {
            ConfigError::InvalidField { field, .. } => assert_eq!(field, "auth.algorithms"),
            other => panic!("Unexpected error: {other:?}", other = other),
        }
    }

    #[test]
    fn zero_handler_timeout_is_rejected() {
        let error = ServerConfig::load_from_path(fixture_path("config_zero_timeout.toml"))
            .expect_err("should error for a zero handler timeout");

        match error {
            ConfigError::InvalidField { field, .. } => {
                assert_eq!(field, "dispatch.handler_timeout_secs")
            }
            other => panic!("Unexpected error: {other:?}", other = other),
        }
    }

    #[test]
    fn missing_file_returns_read_error() {
        let error = ServerConfig::load_from_path(fixture_path("does_not_exist.toml"))
            .expect_err("should error for a missing file");

        assert!(matches!(error, ConfigError::FileRead { .. }), "{error:?}");
    }

    #[test]
    fn load_config_from_env_override() {
        let path = fixture_path("config_valid.toml");
        let config = with_config_env(&path, || {
            ServerConfig::load_from_env_or_default().expect("should load via environment variable")
        });

        assert_eq!(config.source_path, path);
        assert_eq!(config.auth.audience, "emu-mcp-server");
    }
}
