use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use super::required_str;
use crate::server::registry::{CapabilityDescriptor, InvocationContext, ParamSpec, Primitive};

pub const TOOL_NAME: &str = "competitive_edge";
const DEFAULT_INDUSTRY: &str = "Technology";

/// Mock SWOT-style intelligence for one company.
#[derive(Debug, Serialize)]
pub struct CompetitiveIntel {
    pub company: String,
    pub industry: String,
    pub market_position: &'static str,
    pub key_competitors: [&'static str; 3],
    pub market_share: &'static str,
    pub strengths: [&'static str; 3],
    pub weaknesses: [&'static str; 2],
    pub opportunities: [&'static str; 3],
    pub threats: [&'static str; 3],
    pub last_updated: String,
    pub requested_by: String,
}

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::tool(
        TOOL_NAME,
        "Get competitive intelligence data for companies",
        handle,
    )
    .param(
        "company",
        ParamSpec::required(Primitive::String, "Company to profile"),
    )
    .param(
        "industry",
        ParamSpec::optional(Primitive::String, "Industry sector")
            .with_default(json!(DEFAULT_INDUSTRY)),
    )
}

pub async fn handle(ctx: InvocationContext) -> anyhow::Result<Value> {
    let company = required_str(&ctx, "company")?;
    // An empty industry falls back to the default as well.
    let industry = ctx
        .str_arg("industry")
        .filter(|industry| !industry.trim().is_empty())
        .unwrap_or(DEFAULT_INDUSTRY);

    let intel = CompetitiveIntel {
        company: company.to_string(),
        industry: industry.to_string(),
        market_position: "Leader",
        key_competitors: ["Competitor A", "Competitor B", "Competitor C"],
        market_share: "35%",
        strengths: [
            "Strong brand recognition",
            "Innovative product portfolio",
            "Global presence",
        ],
        weaknesses: ["High operational costs", "Dependency on key suppliers"],
        opportunities: [
            "Emerging markets expansion",
            "AI/ML integration",
            "Strategic partnerships",
        ],
        threats: [
            "Regulatory changes",
            "New market entrants",
            "Technology disruption",
        ],
        last_updated: Utc::now().to_rfc3339(),
        requested_by: ctx.identity.subject().to_string(),
    };
    Ok(serde_json::to_value(intel)?)
}
