use crate::{
    cli::{LaunchProfile, TransportMode},
    server::config::ServerConfig,
};

/// Build the `ServerInfo.instructions` string shown to MCP clients.
pub fn build_instructions(profile: &LaunchProfile, config: &ServerConfig) -> String {
    let auth_hint = match profile.transport {
        TransportMode::Http => "Send `Authorization: Bearer <jwt>` with every request",
        TransportMode::Stdio => "The launch token (--token / MCP_BEARER_TOKEN) is checked on every request",
    };
    format!(
        "Loaded config {path}; serving in {transport} mode (host={host}, port={port}, mcp_path={mcp_path}). \
         Tokens must be issued by {issuer} for audience {audience}. {auth_hint}.",
        path = config.source_path.display(),
        transport = profile.transport.as_str(),
        host = config.server.host,
        port = config.server.port,
        mcp_path = config.server.mcp_path,
        issuer = config.auth.issuer,
        audience = config.auth.audience,
    )
}
