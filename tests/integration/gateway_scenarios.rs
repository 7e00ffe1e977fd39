use std::{fs, path::Path, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use emu_mcp::{
    lib::errors::AuthError,
    server::{
        auth::{CredentialVerifier, FileKeySource, KeyCache, VerifierSettings},
        dispatch::{Dispatcher, FailureKind, InvocationResult},
        gateway::{CapabilityCall, Gateway},
        registry::{
            CapabilityDescriptor, CapabilityKind, InvocationContext, ParamSpec, Primitive,
            RegistryBuilder,
        },
    },
    tools::{self, company_database, competitive_analysis},
};
use jsonwebtoken::Algorithm;
use serde_json::{json, Map, Value};

use crate::common::{
    fixture_path, mint_foreign_token, mint_token, valid_claims, TEST_AUDIENCE, TEST_ISSUER,
};

fn gateway_over(jwks_path: &Path) -> Result<Gateway> {
    let cache = KeyCache::new(
        Arc::new(FileKeySource::new(jwks_path)),
        Duration::from_secs(300),
    )
    .with_min_refresh_interval(Duration::ZERO);
    let verifier = CredentialVerifier::new(
        cache,
        VerifierSettings {
            issuer: TEST_ISSUER.into(),
            audience: TEST_AUDIENCE.into(),
            algorithms: vec![Algorithm::RS256],
            leeway_secs: 0,
        },
    );

    let mut builder = RegistryBuilder::new();
    builder.register(
        CapabilityDescriptor::tool(
            "echo",
            "Echo the text argument",
            |ctx: InvocationContext| async move {
                anyhow::Ok(json!(ctx.str_arg("text").unwrap_or_default()))
            },
        )
        .param("text", ParamSpec::required(Primitive::String, "Text to echo")),
    )?;
    tools::register_builtin_capabilities(&mut builder)?;

    let dispatcher = Dispatcher::new(Arc::new(builder.build()), Duration::from_secs(5));
    Ok(Gateway::new(verifier, dispatcher))
}

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn failure_kind(result: &InvocationResult) -> Option<&FailureKind> {
    result.failure().map(|failure| &failure.kind)
}

#[tokio::test]
async fn echo_round_trips_for_a_valid_token() -> Result<()> {
    let gateway = gateway_over(&fixture_path("tests/fixtures/keys/jwks.json"))?;
    let token = mint_token(&valid_claims("alice"))?;

    let result = gateway
        .handle(Some(&token), CapabilityCall::tool("echo", args(json!({ "text": "hi" }))))
        .await;
    assert_eq!(result, InvocationResult::Success(json!("hi")));
    Ok(())
}

#[tokio::test]
async fn rejected_tokens_report_their_reason() -> Result<()> {
    let gateway = gateway_over(&fixture_path("tests/fixtures/keys/jwks.json"))?;
    let call = CapabilityCall::tool("echo", args(json!({ "text": "hi" })));

    let missing = gateway.handle(None, call.clone()).await;
    assert_eq!(
        failure_kind(&missing),
        Some(&FailureKind::Unauthenticated(AuthError::MissingToken))
    );

    let mut claims = valid_claims("alice");
    claims["exp"] = json!(Utc::now().timestamp() - 600);
    let expired = gateway
        .handle(Some(&mint_token(&claims)?), call.clone())
        .await;
    assert_eq!(
        failure_kind(&expired),
        Some(&FailureKind::Unauthenticated(AuthError::Expired))
    );

    let forged = gateway
        .handle(Some(&mint_foreign_token(&valid_claims("mallory"))?), call)
        .await;
    assert!(
        matches!(
            failure_kind(&forged),
            Some(FailureKind::Unauthenticated(AuthError::SignatureInvalid { .. }))
        ),
        "{forged:?}"
    );
    Ok(())
}

#[tokio::test]
async fn missing_key_file_recovers_once_written() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let jwks_path = dir.path().join("jwks.json");
    let gateway = gateway_over(&jwks_path)?;
    let token = mint_token(&valid_claims("alice"))?;
    let call = CapabilityCall::tool("echo", args(json!({ "text": "back" })));

    let first = gateway.handle(Some(&token), call.clone()).await;
    assert!(
        matches!(
            failure_kind(&first),
            Some(FailureKind::Unauthenticated(AuthError::KeySourceUnavailable { .. }))
        ),
        "{first:?}"
    );
    assert_eq!(first.http_status().as_u16(), 503);

    fs::copy(fixture_path("tests/fixtures/keys/jwks.json"), &jwks_path)?;
    let second = gateway.handle(Some(&token), call).await;
    assert_eq!(second, InvocationResult::Success(json!("back")));
    Ok(())
}

#[tokio::test]
async fn repeated_calls_return_the_same_answer() -> Result<()> {
    let gateway = gateway_over(&fixture_path("tests/fixtures/keys/jwks.json"))?;
    let token = mint_token(&valid_claims("alice"))?;
    let call = CapabilityCall::tool(
        "competitive_edge",
        args(json!({ "company": "Acme", "industry": "Retail" })),
    );

    let first = gateway.handle(Some(&token), call.clone()).await;
    let second = gateway.handle(Some(&token), call).await;
    let (InvocationResult::Success(mut first), InvocationResult::Success(mut second)) =
        (first, second)
    else {
        panic!("both calls should succeed");
    };
    for payload in [&mut first, &mut second] {
        if let Some(object) = payload.as_object_mut() {
            object.remove("last_updated");
        }
    }
    assert_eq!(first, second);
    assert_eq!(first["industry"], "Retail");
    Ok(())
}

#[tokio::test]
async fn resources_and_prompts_go_through_the_same_gate() -> Result<()> {
    let gateway = gateway_over(&fixture_path("tests/fixtures/keys/jwks.json"))?;
    let token = mint_token(&valid_claims("alice"))?;

    let resource = gateway
        .handle(
            Some(&token),
            CapabilityCall::new(
                company_database::RESOURCE_URI,
                CapabilityKind::Resource,
                Map::new(),
            ),
        )
        .await;
    assert!(resource.is_success(), "{resource:?}");

    let prompt = gateway
        .handle(
            Some(&token),
            CapabilityCall::new(
                competitive_analysis::PROMPT_NAME,
                CapabilityKind::Prompt,
                args(json!({ "company": "Acme", "industry": "Retail" })),
            ),
        )
        .await;
    let InvocationResult::Success(Value::String(text)) = &prompt else {
        panic!("prompt should render text: {prompt:?}");
    };
    assert!(text.contains("Acme"));
    assert!(text.contains("Retail"));

    let unauthenticated = gateway
        .handle(
            None,
            CapabilityCall::new(
                company_database::RESOURCE_URI,
                CapabilityKind::Resource,
                Map::new(),
            ),
        )
        .await;
    assert!(unauthenticated.failure().is_some_and(|f| f.is_auth_rejection()));
    Ok(())
}
