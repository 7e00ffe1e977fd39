use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use super::required_str;
use crate::server::registry::{CapabilityDescriptor, InvocationContext, ParamSpec, Primitive};

pub const TOOL_NAME: &str = "file_search";
const DEFAULT_PATH: &str = "/";

#[derive(Debug, Serialize)]
pub struct FileMatch {
    pub file_path: String,
    pub file_name: String,
    pub file_type: &'static str,
    pub size: &'static str,
    pub last_modified: &'static str,
    pub content_preview: String,
}

#[derive(Debug, Serialize)]
pub struct FileSearchResponse {
    pub query: String,
    pub search_path: String,
    pub results: Vec<FileMatch>,
    pub total_results: usize,
    pub search_timestamp: String,
    pub requested_by: String,
}

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::tool(
        TOOL_NAME,
        "Search files and documents in the system",
        handle,
    )
    .param(
        "query",
        ParamSpec::required(Primitive::String, "Text to search for"),
    )
    .param(
        "path",
        ParamSpec::optional(Primitive::String, "Directory to search under")
            .with_default(json!(DEFAULT_PATH)),
    )
}

pub async fn handle(ctx: InvocationContext) -> anyhow::Result<Value> {
    let query = required_str(&ctx, "query")?;
    let path = ctx.str_arg("path").unwrap_or(DEFAULT_PATH);
    let base = path.trim_end_matches('/');

    let results = vec![
        FileMatch {
            file_path: format!("{base}/document_{query}_2024.pdf"),
            file_name: format!("document_{query}_2024.pdf"),
            file_type: "pdf",
            size: "2.4 MB",
            last_modified: "2024-01-15T10:30:00Z",
            content_preview: format!("This document contains information about {query}..."),
        },
        FileMatch {
            file_path: format!("{base}/report_{query}_analysis.docx"),
            file_name: format!("report_{query}_analysis.docx"),
            file_type: "docx",
            size: "1.8 MB",
            last_modified: "2024-01-14T15:45:00Z",
            content_preview: format!("Analysis report covering {query} topics..."),
        },
    ];

    let response = FileSearchResponse {
        query: query.to_string(),
        search_path: path.to_string(),
        total_results: results.len(),
        results,
        search_timestamp: Utc::now().to_rfc3339(),
        requested_by: ctx.identity.subject().to_string(),
    };
    Ok(serde_json::to_value(response)?)
}
