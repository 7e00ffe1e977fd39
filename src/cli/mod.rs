//! CLI entrypoint module structure.
use anyhow::{Context, Result};

use crate::tools;

pub mod args;
pub mod profile;

pub use args::{CliCommand, LaunchProfileArgs, ParsedCommand};
pub use profile::{
    build_launch_args, resolve_config_path, resolve_token, LaunchProfile, TokenSource,
    TransportMode, MCP_BEARER_TOKEN_ENV,
};

/// Execute CLI command mode and return a user-facing result payload.
pub fn execute_cli_command(command: CliCommand) -> Result<String> {
    match command {
        CliCommand::Capabilities => {
            let registry =
                tools::builtin_registry().context("failed to register built-in capabilities")?;
            Ok(serde_json::to_string_pretty(&registry.summaries())?)
        }
    }
}
