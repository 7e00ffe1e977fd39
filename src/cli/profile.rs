//! LaunchProfile and token/config resolution.
use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;

const DEFAULT_CONFIG: &str = "config.toml";
const MAX_TOKEN_LENGTH: usize = 16 * 1024;
const MCP_CONFIG_ENV: &str = "MCP_CONFIG_PATH";
pub const MCP_BEARER_TOKEN_ENV: &str = "MCP_BEARER_TOKEN";

/// Transport the server listens on.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum TransportMode {
    Http,
    Stdio,
}

impl TransportMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Http => "http",
            TransportMode::Stdio => "stdio",
        }
    }
}

/// Where the stdio launch token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Env,
    Cli,
    Missing,
}

impl TokenSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Env => "env",
            TokenSource::Cli => "cli",
            TokenSource::Missing => "missing",
        }
    }
}

/// Resolved launch profile.
#[derive(Debug, Clone)]
pub struct LaunchProfile {
    pub config_path: PathBuf,
    pub transport: TransportMode,
    pub bearer_token: Option<String>,
    pub token_source: TokenSource,
    pub launch_args: Vec<String>,
}

/// Resolve config path in the order: CLI override → env var → default.
pub fn resolve_config_path(override_path: Option<PathBuf>) -> Result<PathBuf> {
    let path = override_path
        .or_else(|| env::var_os(MCP_CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    if path.is_absolute() {
        return Ok(path);
    }

    let cwd = env::current_dir().context("failed to obtain current directory")?;
    Ok(cwd.join(path))
}

/// Resolve the launch token in the order: CLI override → env var.
pub fn resolve_token(token_override: Option<String>) -> (Option<String>, TokenSource) {
    if let Some(token) = token_override.and_then(|v| normalize_token(&v)) {
        return (Some(token), TokenSource::Cli);
    }

    if let Some(env_token) = env::var(MCP_BEARER_TOKEN_ENV)
        .ok()
        .and_then(|v| normalize_token(&v))
    {
        return (Some(env_token), TokenSource::Env);
    }

    (None, TokenSource::Missing)
}

/// Build launch arguments suitable for reproduction/logging. The token is never included.
pub fn build_launch_args(transport: TransportMode, config: &Path) -> Vec<String> {
    vec![
        format!("--transport={}", transport.as_str()),
        format!("--config={}", config.display()),
    ]
}

fn normalize_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("Bearer ")
        .map(str::trim)
        .unwrap_or(trimmed);
    if trimmed.is_empty() || trimmed.len() > MAX_TOKEN_LENGTH {
        return None;
    }
    Some(trimmed.to_string())
}
