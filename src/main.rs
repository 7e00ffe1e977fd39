//! `emu-mcp` binary: serves the capability gateway over HTTP (envelope API
//! and `/mcp`) or MCP stdio, or prints the capability table.
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use emu_mcp::{
    cli::{execute_cli_command, CliCommand, LaunchProfile, LaunchProfileArgs, ParsedCommand},
    lib::telemetry,
    server::{
        config::ServerConfig,
        runtime::{self, RuntimeExit},
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    let outcome = match LaunchProfileArgs::parse().into_command() {
        Ok(ParsedCommand::Cli(command)) => print_cli_output(command),
        Ok(ParsedCommand::RunServer(profile)) => serve(profile).await,
        Err(err) => Err(RuntimeExit::from_error(err)),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(exit) => exit.report(),
    }
}

/// Load configuration for the selected transport and run until shutdown.
///
/// stdio launches exit with a structured auth code when the launch token
/// is missing or rejected.
async fn serve(profile: LaunchProfile) -> Result<(), RuntimeExit> {
    telemetry::init_tracing().map_err(RuntimeExit::from_error)?;
    let config = ServerConfig::load_from_path(profile.config_path.clone())
        .with_context(|| {
            format!(
                "cannot start the {} transport without a valid configuration",
                profile.transport.as_str()
            )
        })
        .map_err(RuntimeExit::from_error)?;
    runtime::run_server(profile, config).await
}

fn print_cli_output(command: CliCommand) -> Result<(), RuntimeExit> {
    let output = execute_cli_command(command).map_err(RuntimeExit::from_error)?;
    println!("{output}");
    Ok(())
}
