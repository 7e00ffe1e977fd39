//! Transport startup: HTTP (envelope API + MCP) and MCP over stdio.
mod mcp;
mod router;
mod server_info;
mod startup;

pub use mcp::{GatewayMcpServer, McpCredentials};
pub use router::build_router;
pub use server_info::build_instructions;
pub use startup::{build_gateway, run_server, RuntimeExit};
