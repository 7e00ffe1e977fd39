//! HTTP transport: envelope API plus the streamable MCP endpoint.
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::mcp::{GatewayMcpServer, McpCredentials};
use crate::{
    lib::errors::AuthError,
    server::{
        auth::{bearer_from_headers, Identity},
        dispatch::{FailureKind, InvocationFailure, InvocationResult},
        gateway::{CapabilityCall, Gateway},
        registry::CapabilityKind,
    },
};

const WWW_AUTHENTICATE_REALM: &str = "emu-mcp";

/// Body of `POST /invoke`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InvokeBody {
    name: String,
    #[serde(default)]
    kind: CapabilityKind,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

/// Build the full HTTP application.
///
/// `/healthz` is public. `/invoke`, `/capabilities` and the MCP endpoint sit
/// behind the bearer middleware.
pub fn build_router(gateway: Arc<Gateway>, mcp_path: &str, instructions: String) -> Router {
    let mcp_gateway = Arc::clone(&gateway);
    let mcp_service = StreamableHttpService::new(
        move || {
            Ok(GatewayMcpServer::new(
                Arc::clone(&mcp_gateway),
                McpCredentials::RequestExtensions,
                instructions.clone(),
            ))
        },
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let protected = Router::new()
        .route("/invoke", post(invoke))
        .route("/capabilities", get(capabilities))
        .nest_service(mcp_path, mcp_service)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&gateway),
            require_bearer,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(protected)
        .with_state(gateway)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Verify the bearer token and attach the resulting `Identity` to the request.
async fn require_bearer(
    State(gateway): State<Arc<Gateway>>,
    mut request: Request,
    next: Next,
) -> Response {
    let verified = gateway
        .authenticate(bearer_from_headers(request.headers()))
        .await;
    match verified {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => envelope_response(&InvocationFailure::unauthenticated(err).into()),
    }
}

async fn invoke(
    State(gateway): State<Arc<Gateway>>,
    Extension(identity): Extension<Identity>,
    body: Bytes,
) -> Response {
    let parsed: InvokeBody = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(err) => {
            return envelope_response(&InvocationFailure::invalid_request(err.to_string()).into())
        }
    };
    let call = CapabilityCall::new(
        parsed.name,
        parsed.kind,
        parsed.arguments.unwrap_or_default(),
    );
    let result = gateway.invoke(identity, call).await;
    envelope_response(&result)
}

async fn capabilities(State(gateway): State<Arc<Gateway>>) -> Response {
    let summaries = gateway.registry().summaries();
    let result = InvocationResult::Success(json!(summaries));
    envelope_response(&result)
}

async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn envelope_response(result: &InvocationResult) -> Response {
    let mut response = (result.http_status(), Json(result.to_envelope())).into_response();
    if let Some(challenge) = result.failure().and_then(bearer_challenge) {
        response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
    }
    response
}

/// `WWW-Authenticate` value for 401 responses.
fn bearer_challenge(failure: &InvocationFailure) -> Option<HeaderValue> {
    if failure.http_status() != StatusCode::UNAUTHORIZED {
        return None;
    }
    let challenge = match &failure.kind {
        FailureKind::Unauthenticated(AuthError::MissingToken) => {
            format!("Bearer realm=\"{WWW_AUTHENTICATE_REALM}\"")
        }
        FailureKind::Unauthenticated(err) => format!(
            "Bearer realm=\"{WWW_AUTHENTICATE_REALM}\", error=\"invalid_token\", error_description=\"{}\"",
            err.code()
        ),
        _ => return None,
    };
    HeaderValue::from_str(&challenge).ok()
}
