use std::sync::Arc;

use rmcp::{
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Content, ErrorData,
        GetPromptRequestParam, GetPromptResult, ListPromptsResult, ListResourcesResult,
        ListToolsResult, PaginatedRequestParam, Prompt, PromptArgument, PromptMessage,
        PromptMessageRole, RawResource, ReadResourceRequestParam, ReadResourceResult,
        ResourceContents, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    RoleServer,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::{
    lib::errors::AuthError,
    server::{
        auth::Identity,
        dispatch::{FailureKind, InvocationFailure, InvocationResult},
        gateway::{CapabilityCall, Gateway},
        registry::{CapabilityDescriptor, CapabilityKind},
    },
};

/// Where an MCP session gets its caller identity from.
#[derive(Clone)]
pub enum McpCredentials {
    /// Streamable HTTP: the bearer middleware stores the `Identity` on the request.
    RequestExtensions,
    /// stdio: the token supplied at launch, re-verified on every request.
    LaunchToken(Arc<str>),
}

/// rmcp handler bridging `tools/*`, `resources/*` and `prompts/*` onto the gateway.
#[derive(Clone)]
pub struct GatewayMcpServer {
    gateway: Arc<Gateway>,
    credentials: McpCredentials,
    instructions: Arc<String>,
}

impl GatewayMcpServer {
    pub fn new(gateway: Arc<Gateway>, credentials: McpCredentials, instructions: String) -> Self {
        Self {
            gateway,
            credentials,
            instructions: Arc::new(instructions),
        }
    }

    async fn caller(&self, context: &RequestContext<RoleServer>) -> Result<Identity, ErrorData> {
        let identity = match &self.credentials {
            McpCredentials::RequestExtensions => context
                .extensions
                .get::<http::request::Parts>()
                .and_then(|parts| parts.extensions.get::<Identity>())
                .cloned()
                .ok_or(AuthError::MissingToken),
            McpCredentials::LaunchToken(token) => {
                self.gateway.authenticate(Some(token.as_ref())).await
            }
        };
        identity.map_err(|err| InvocationFailure::unauthenticated(err).to_body().to_error_data())
    }

    async fn invoke(
        &self,
        context: &RequestContext<RoleServer>,
        call: CapabilityCall,
    ) -> Result<InvocationResult, ErrorData> {
        let identity = self.caller(context).await?;
        debug!(
            target: "emu_mcp::mcp",
            capability = %call.name,
            kind = call.kind.as_str(),
            subject = identity.subject(),
            "Bridging MCP request"
        );
        Ok(self.gateway.invoke(identity, call).await)
    }

    fn descriptors(&self, kind: CapabilityKind) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.gateway.registry().list_kind(kind)
    }
}

fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn protocol_error(failure: &InvocationFailure) -> ErrorData {
    failure.to_body().to_error_data()
}

fn tool_definition(descriptor: &CapabilityDescriptor) -> Tool {
    Tool::new(
        descriptor.name().to_string(),
        descriptor.description().to_string(),
        Arc::new(descriptor.schema().to_json_schema()),
    )
}

fn prompt_definition(descriptor: &CapabilityDescriptor) -> Result<Prompt, ErrorData> {
    let arguments = descriptor
        .schema()
        .iter()
        .map(|(name, spec)| {
            serde_json::from_value::<PromptArgument>(json!({
                "name": name,
                "description": spec.description,
                "required": spec.required,
            }))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ErrorData::internal_error(err.to_string(), None))?;
    Ok(Prompt::new(
        descriptor.name(),
        Some(descriptor.description()),
        Some(arguments),
    ))
}

fn resource_name(uri: &str) -> &str {
    uri.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or(uri)
}

impl ServerHandler for GatewayMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            instructions: Some((*self.instructions).clone()),
            ..ServerInfo::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        self.caller(&context).await?;
        let tools = self
            .descriptors(CapabilityKind::Tool)
            .map(tool_definition)
            .collect();
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let call = CapabilityCall::tool(
            request.name.to_string(),
            request.arguments.unwrap_or_default(),
        );
        match self.invoke(&context, call).await? {
            InvocationResult::Success(payload) => {
                let content = match payload {
                    Value::String(text) => Content::text(text),
                    other => Content::json(other)?,
                };
                Ok(CallToolResult::success(vec![content]))
            }
            InvocationResult::Failure(failure) => match failure.kind {
                FailureKind::Handler | FailureKind::Timeout => {
                    let body = serde_json::to_string(&failure.to_body())
                        .unwrap_or_else(|_| failure.message.clone());
                    Ok(CallToolResult::error(vec![Content::text(body)]))
                }
                _ => Err(protocol_error(&failure)),
            },
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        self.caller(&context).await?;
        let resources = self
            .descriptors(CapabilityKind::Resource)
            .map(|descriptor| {
                let mut raw = RawResource::new(descriptor.name(), resource_name(descriptor.name()));
                raw.description = Some(descriptor.description().to_string());
                raw.mime_type = Some("application/json".into());
                raw.no_annotation()
            })
            .collect();
        Ok(ListResourcesResult::with_all_items(resources))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let call = CapabilityCall::new(request.uri.clone(), CapabilityKind::Resource, Map::new());
        match self.invoke(&context, call).await? {
            InvocationResult::Success(payload) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(payload_text(&payload), request.uri)],
            }),
            InvocationResult::Failure(failure) => Err(protocol_error(&failure)),
        }
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, ErrorData> {
        self.caller(&context).await?;
        let prompts = self
            .descriptors(CapabilityKind::Prompt)
            .map(prompt_definition)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListPromptsResult::with_all_items(prompts))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, ErrorData> {
        let description = self
            .gateway
            .registry()
            .resolve(&request.name, CapabilityKind::Prompt)
            .ok()
            .map(|descriptor| descriptor.description().to_string());
        let call = CapabilityCall::new(
            request.name,
            CapabilityKind::Prompt,
            request.arguments.unwrap_or_default(),
        );
        match self.invoke(&context, call).await? {
            InvocationResult::Success(payload) => Ok(GetPromptResult {
                description,
                messages: vec![PromptMessage::new_text(
                    PromptMessageRole::User,
                    payload_text(&payload),
                )],
            }),
            InvocationResult::Failure(failure) => Err(protocol_error(&failure)),
        }
    }
}
