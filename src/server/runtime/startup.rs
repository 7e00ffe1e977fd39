use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, Error};
use rmcp::ServiceExt;
use tokio::net::TcpListener;

use super::{build_instructions, build_router, GatewayMcpServer, McpCredentials};
use crate::{
    cli::{LaunchProfile, TransportMode},
    lib::telemetry::{emit_runtime_mode, RuntimeModeTelemetry},
    server::{
        auth::{authenticate_stdio_launch, CredentialVerifier, StdioCredential},
        config::ServerConfig,
        dispatch::Dispatcher,
        gateway::Gateway,
    },
    tools,
};

/// Bundles a runtime error message with an exit code and optional structured error data.
#[derive(Debug)]
pub struct RuntimeExit {
    message: String,
    exit_code: ExitCode,
    error_data: Option<rmcp::model::ErrorData>,
}

impl RuntimeExit {
    pub fn structured(error: rmcp::model::ErrorData, exit_code: ExitCode) -> Self {
        Self {
            message: error.message.to_string(),
            exit_code,
            error_data: Some(error),
        }
    }

    pub fn from_error(err: impl Into<Error>) -> Self {
        let err = err.into();
        Self {
            message: format!("{err:?}"),
            exit_code: ExitCode::FAILURE,
            error_data: None,
        }
    }

    pub fn report(self) -> ExitCode {
        if let Some(data) = self.error_data {
            if let Ok(serialized) = serde_json::to_string(&data) {
                eprintln!("{serialized}");
            } else {
                eprintln!("{}", data.message);
            }
        } else {
            eprintln!("{}", self.message);
        }
        self.exit_code
    }

    pub fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    pub fn error_data(&self) -> Option<&rmcp::model::ErrorData> {
        self.error_data.as_ref()
    }
}

/// Assemble verifier, built-in registry and dispatcher from configuration.
pub fn build_gateway(config: &ServerConfig) -> anyhow::Result<Arc<Gateway>> {
    let registry = tools::builtin_registry().context("failed to register built-in capabilities")?;
    let verifier = CredentialVerifier::from_config(&config.auth)
        .context("failed to initialize the credential verifier")?;
    let dispatcher = Dispatcher::new(Arc::new(registry), config.dispatch.handler_timeout);
    Ok(Arc::new(Gateway::new(verifier, dispatcher)))
}

/// Start the server on the transport selected by the launch profile.
pub async fn run_server(profile: LaunchProfile, config: ServerConfig) -> Result<(), RuntimeExit> {
    let gateway = build_gateway(&config).map_err(RuntimeExit::from_error)?;
    let instructions = build_instructions(&profile, &config);

    emit_runtime_mode(&RuntimeModeTelemetry {
        transport: profile.transport.as_str(),
        host: (profile.transport == TransportMode::Http).then_some(config.server.host.as_str()),
        port: (profile.transport == TransportMode::Http).then_some(config.server.port),
        config_path: config.source_path.to_string_lossy().as_ref(),
        capabilities: gateway.registry().len(),
        instructions: &instructions,
        launch_args: &profile.launch_args,
    });

    match profile.transport {
        TransportMode::Stdio => {
            let credential =
                StdioCredential::new(profile.bearer_token.clone(), profile.token_source);
            run_stdio(gateway, credential, instructions).await
        }
        TransportMode::Http => run_http(gateway, &config, instructions).await,
    }
}

async fn run_stdio(
    gateway: Arc<Gateway>,
    credential: StdioCredential,
    instructions: String,
) -> Result<(), RuntimeExit> {
    let identity = authenticate_stdio_launch(gateway.verifier(), &credential).await?;
    tracing::info!(
        target: "emu_mcp::runtime",
        transport = "stdio",
        subject = identity.subject(),
        token_source = credential.source.as_str(),
        "Launch token verified"
    );

    let token: Arc<str> = Arc::from(credential.token().unwrap_or_default());
    let server = GatewayMcpServer::new(gateway, McpCredentials::LaunchToken(token), instructions);
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(RuntimeExit::from_error)?;
    running.waiting().await.map_err(RuntimeExit::from_error)?;
    Ok(())
}

async fn run_http(
    gateway: Arc<Gateway>,
    config: &ServerConfig,
    instructions: String,
) -> Result<(), RuntimeExit> {
    let warm = Arc::clone(&gateway);
    tokio::spawn(async move { warm.verifier().key_cache().prime().await });

    let app = build_router(gateway, &config.server.mcp_path, instructions);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind TCP port {addr}"))
        .map_err(RuntimeExit::from_error)?;
    tracing::info!(
        target: "emu_mcp::runtime",
        transport = "http",
        bind_addr = %addr,
        mcp_path = %config.server.mcp_path,
        "Started listening in HTTP mode"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| format!("HTTP server on {addr} failed"))
        .map_err(RuntimeExit::from_error)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(
            target: "emu_mcp::runtime",
            error = %err,
            "Failed to install Ctrl+C handler"
        );
        std::future::pending::<()>().await;
    }
    tracing::info!(target: "emu_mcp::runtime", "Shutdown signal received");
}
