#![allow(dead_code)]

use std::{io, path::PathBuf, process::Stdio};

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf},
    process::{Child, ChildStdin, ChildStdout, Command},
    task::JoinHandle,
};

pub const BINARY_PATH: &str = env!("CARGO_BIN_EXE_emu-mcp");
pub const TEST_KID: &str = "emu-test-key-1";
pub const TEST_ISSUER: &str = "https://auth.emu-test.local";
pub const TEST_AUDIENCE: &str = "emu-mcp-server";

pub fn fixture(relative: &str) -> String {
    fixture_path(relative).display().to_string()
}

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

/// Claims accepted by the fixture configuration, valid for an hour.
pub fn valid_claims(subject: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": subject,
        "iss": TEST_ISSUER,
        "aud": TEST_AUDIENCE,
        "iat": now,
        "exp": now + 3600,
    })
}

/// Sign `claims` with the key published in `tests/fixtures/keys/jwks.json`.
pub fn mint_token(claims: &Value) -> Result<String> {
    sign(claims, "tests/fixtures/keys/test_rsa.pem")
}

/// Sign with a key that is not published.
pub fn mint_foreign_token(claims: &Value) -> Result<String> {
    sign(claims, "tests/fixtures/keys/other_rsa.pem")
}

fn sign(claims: &Value, pem_path: &str) -> Result<String> {
    let pem = std::fs::read(fixture_path(pem_path))
        .with_context(|| format!("failed to read {pem_path}"))?;
    let key = EncodingKey::from_rsa_pem(&pem).context("fixture key must be RSA PEM")?;
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    encode(&header, claims, &key).context("failed to sign token")
}

/// Spawn the server on stdio with the given launch token.
pub async fn spawn_stdio_server(
    token: Option<&str>,
) -> Result<(Child, ChildIoBridge, Option<JoinHandle<()>>)> {
    let mut command = Command::new(BINARY_PATH);
    command
        .arg("--transport")
        .arg("stdio")
        .env("MCP_CONFIG_PATH", fixture("tests/fixtures/config_jwks_file.toml"))
        .env_remove("MCP_BEARER_TOKEN")
        .stdout(Stdio::piped())
        .stdin(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(token) = token {
        command.env("MCP_BEARER_TOKEN", token);
    }
    let mut child = command.spawn().context("failed to spawn server process")?;
    let stdout = child.stdout.take().context("child stdout")?;
    let stdin = child.stdin.take().context("child stdin")?;
    let bridge = ChildIoBridge::new(stdout, stdin);
    let stderr_handle = child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
        })
    });
    Ok((child, bridge, stderr_handle))
}

pub struct ChildIoBridge {
    stdout: ChildStdout,
    stdin: ChildStdin,
}

impl ChildIoBridge {
    pub fn new(stdout: ChildStdout, stdin: ChildStdin) -> Self {
        Self { stdout, stdin }
    }
}

impl AsyncRead for ChildIoBridge {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for ChildIoBridge {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        data: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        std::pin::Pin::new(&mut self.stdin).poll_write(cx, data)
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.stdin).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        std::pin::Pin::new(&mut self.stdin).poll_shutdown(cx)
    }
}
