use tracing::{debug, info};

use super::{auth::KeySourceSpec, ServerConfig, CONFIG_ENV_KEY, DEFAULT_CONFIG_PATH};

pub fn log_env_source(path: &std::path::Path, from_env: bool) {
    if from_env {
        info!(
            target: "emu_mcp::config",
            path = %path.display(),
            "Loading configuration using MCP_CONFIG_PATH environment variable"
        );
    } else {
        debug!(
            target: "emu_mcp::config",
            path = %path.display(),
            env = CONFIG_ENV_KEY,
            default = DEFAULT_CONFIG_PATH,
            "MCP_CONFIG_PATH not set; using default config.toml"
        );
    }
}

pub fn log_loaded(config: &ServerConfig) {
    let key_source = match &config.auth.key_source {
        KeySourceSpec::Remote { uri } => uri.clone(),
        KeySourceSpec::File { path } => path.display().to_string(),
    };
    info!(
        target: "emu_mcp::config",
        path = %config.source_path.display(),
        host = %config.server.host,
        port = config.server.port,
        mcp_path = %config.server.mcp_path,
        key_source = %key_source,
        issuer = %config.auth.issuer,
        audience = %config.auth.audience,
        jwks_cache_ttl_secs = config.auth.jwks_cache_ttl.as_secs(),
        handler_timeout_secs = config.dispatch.handler_timeout.as_secs(),
        "Configuration file loaded successfully"
    );
}
