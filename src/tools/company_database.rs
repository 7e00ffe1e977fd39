use chrono::Utc;
use serde_json::{json, Value};

use crate::server::registry::{CapabilityDescriptor, InvocationContext};

pub const RESOURCE_URI: &str = "https://emu-mcp.com/resources/company_database";

pub fn descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::resource(RESOURCE_URI, "Access to company database resource", handle)
}

pub async fn handle(ctx: InvocationContext) -> anyhow::Result<Value> {
    Ok(json!({
        "type": "company_database",
        "description": "Internal company database with competitive intelligence",
        "access_level": "restricted",
        "last_sync": Utc::now().to_rfc3339(),
        "requested_by": ctx.identity.subject(),
    }))
}
