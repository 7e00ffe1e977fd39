use std::{net::TcpListener as StdTcpListener, process::Stdio, time::Duration};

use anyhow::{bail, Context, Result};
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::process::{Child, Command};

use crate::common::{fixture, mint_token, valid_claims, BINARY_PATH};

struct HttpServer {
    _child: Child,
    _config_dir: TempDir,
    base_url: String,
}

fn free_port() -> Result<u16> {
    let listener = StdTcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

async fn spawn_http_server() -> Result<HttpServer> {
    let port = free_port()?;
    let config_dir = tempfile::tempdir()?;
    let config_path = config_dir.path().join("config.toml");
    let jwks = fixture("tests/fixtures/keys/jwks.json");
    std::fs::write(
        &config_path,
        format!(
            "[server]\nhost = \"127.0.0.1\"\nport = {port}\n\n\
             [auth]\njwks_path = '{jwks}'\nissuer = \"https://auth.emu-test.local\"\n\
             audience = \"emu-mcp-server\"\n"
        ),
    )?;

    let child = Command::new(BINARY_PATH)
        .arg("--transport")
        .arg("http")
        .env("MCP_CONFIG_PATH", &config_path)
        .env_remove("MCP_BEARER_TOKEN")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .context("failed to spawn HTTP server")?;

    let server = HttpServer {
        _child: child,
        _config_dir: config_dir,
        base_url: format!("http://127.0.0.1:{port}"),
    };
    wait_until_healthy(&server.base_url).await?;
    Ok(server)
}

async fn wait_until_healthy(base_url: &str) -> Result<()> {
    let client = Client::new();
    for _ in 0..100 {
        if let Ok(response) = client.get(format!("{base_url}/healthz")).send().await {
            if response.status().is_success() {
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    bail!("server at {base_url} never became healthy")
}

#[tokio::test]
async fn http_envelope_api_and_mcp_endpoint_require_a_token() -> Result<()> {
    let server = spawn_http_server().await?;
    let client = Client::new();
    let token = mint_token(&valid_claims("analyst@emu.test"))?;
    let invoke_url = format!("{}/invoke", server.base_url);

    let health: Value = client
        .get(format!("{}/healthz", server.base_url))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(health["status"], "ok");

    let response = client
        .post(&invoke_url)
        .bearer_auth(&token)
        .json(&json!({
            "name": "competitive_edge",
            "arguments": { "company": "Acme" }
        }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "success");
    assert_eq!(body["payload"]["company"], "Acme");
    assert_eq!(body["payload"]["industry"], "Technology");

    let response = client
        .post(&invoke_url)
        .json(&json!({ "name": "competitive_edge", "arguments": { "company": "Acme" } }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "failure");

    let response = client
        .post(&invoke_url)
        .bearer_auth(&token)
        .json(&json!({ "name": "ghost" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let initialize = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": { "name": "integration", "version": "0.0.0" }
        }
    });
    let mcp_url = format!("{}/mcp", server.base_url);

    let response = client
        .post(&mcp_url)
        .header(header::ACCEPT, "application/json, text/event-stream")
        .json(&initialize)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(&mcp_url)
        .bearer_auth(&token)
        .header(header::ACCEPT, "application/json, text/event-stream")
        .json(&initialize)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
