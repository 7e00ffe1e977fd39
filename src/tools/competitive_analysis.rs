use serde_json::Value;

use super::required_str;
use crate::server::registry::{CapabilityDescriptor, InvocationContext, ParamSpec, Primitive};

pub const PROMPT_NAME: &str = "https://emu-mcp.com/prompts/competitive_analysis";

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::prompt(
        PROMPT_NAME,
        "Prompt template for competitive analysis",
        handle,
    )
    .param(
        "company",
        ParamSpec::required(Primitive::String, "Company to analyze"),
    )
    .param(
        "industry",
        ParamSpec::required(Primitive::String, "Industry sector"),
    )
}

pub fn render(company: &str, industry: &str) -> String {
    format!(
        "Analyze the competitive landscape for {company} in the {industry} sector.\n\
         \n\
         Consider:\n\
         1. Market position and share\n\
         2. Key competitors and their strategies\n\
         3. Strengths, weaknesses, opportunities, and threats\n\
         4. Recommendations for competitive advantage\n\
         \n\
         Provide actionable insights based on the available data."
    )
}

pub async fn handle(ctx: InvocationContext) -> anyhow::Result<Value> {
    let company = required_str(&ctx, "company")?;
    let industry = required_str(&ctx, "industry")?;
    Ok(Value::String(render(company, industry)))
}
