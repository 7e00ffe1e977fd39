use std::{
    process::{Command as StdCommand, Stdio},
    time::Duration,
};

use anyhow::{Context, Result};
use rmcp::{
    model::{CallToolRequestParam, ClientInfo},
    serve_client,
};
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::common::{fixture, mint_token, spawn_stdio_server, valid_claims, BINARY_PATH};

fn stdio_exit_code(config: &str, token: Option<&str>) -> Option<i32> {
    let mut command = StdCommand::new(BINARY_PATH);
    command
        .arg("--transport")
        .arg("stdio")
        .env("MCP_CONFIG_PATH", fixture(config))
        .env_remove("MCP_BEARER_TOKEN")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(token) = token {
        command.env("MCP_BEARER_TOKEN", token);
    }
    command.status().expect("process should start").code()
}

#[test]
fn missing_launch_token_exits_with_token_required() {
    let code = stdio_exit_code("tests/fixtures/config_jwks_file.toml", None);
    assert_eq!(code, Some(43), "token required exit code (43) expected");
}

#[test]
fn garbage_launch_token_exits_with_auth_failure() {
    let code = stdio_exit_code(
        "tests/fixtures/config_jwks_file.toml",
        Some("definitely-not-a-jwt"),
    );
    assert_eq!(code, Some(42), "authentication failure exit code (42) expected");
}

#[test]
fn unreadable_key_set_exits_with_key_source_unavailable() {
    let token = mint_token(&valid_claims("analyst@emu.test")).expect("token should sign");
    let code = stdio_exit_code("tests/fixtures/config_missing_jwks.toml", Some(&token));
    assert_eq!(code, Some(45), "key source unavailable exit code (45) expected");
}

#[tokio::test]
async fn valid_launch_token_allows_handshake_and_tool_calls() -> Result<()> {
    let token = mint_token(&valid_claims("analyst@emu.test"))?;
    let (mut child, transport, stderr_task) = spawn_stdio_server(Some(&token)).await?;
    let client = serve_client(ClientInfo::default(), transport).await?;

    let list = client.list_tools(None).await?;
    for expected in ["file_search", "competitive_edge"] {
        assert!(
            list.tools.iter().any(|tool| tool.name.as_ref() == expected),
            "list_tools should include {expected}: {:?}",
            list.tools
        );
    }

    let arguments = json!({ "query": "quarterly" });
    let result = client
        .call_tool(CallToolRequestParam {
            name: "file_search".into(),
            arguments: arguments.as_object().cloned(),
        })
        .await?;
    assert_ne!(result.is_error, Some(true), "file_search failed: {result:?}");
    let text = result
        .content
        .first()
        .and_then(|content| content.as_text())
        .map(|text| text.text.clone())
        .context("file_search should return text content")?;
    let payload: Value = serde_json::from_str(&text)?;
    assert_eq!(payload["query"], "quarterly");
    assert_eq!(payload["search_path"], "/");
    assert_eq!(payload["total_results"], 2);
    assert_eq!(payload["requested_by"], "analyst@emu.test");

    let missing = client
        .call_tool(CallToolRequestParam {
            name: "file_search".into(),
            arguments: None,
        })
        .await;
    assert!(missing.is_err(), "missing `query` should be a protocol error");

    client.cancel().await?;

    let status = timeout(Duration::from_secs(5), child.wait()).await??;
    assert!(status.success(), "expected clean server shutdown");
    if let Some(handle) = stderr_task {
        let _ = handle.await;
    }
    Ok(())
}
