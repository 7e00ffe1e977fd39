//! Built-in capabilities served by the gateway. All data is mock data.
use crate::{
    lib::errors::ConfigError,
    server::registry::{CapabilityRegistry, InvocationContext, RegistryBuilder},
};

pub mod company_database;
pub mod competitive_analysis;
pub mod competitive_edge;
pub mod file_search;

/// Register every built-in capability on `builder`.
pub fn register_builtin_capabilities(builder: &mut RegistryBuilder) -> Result<(), ConfigError> {
    builder.register(file_search::descriptor())?;
    builder.register(competitive_edge::descriptor())?;
    builder.register(company_database::descriptor())?;
    builder.register(competitive_analysis::descriptor())?;
    Ok(())
}

/// Frozen registry holding only the built-in capabilities.
pub fn builtin_registry() -> Result<CapabilityRegistry, ConfigError> {
    let mut builder = RegistryBuilder::new();
    register_builtin_capabilities(&mut builder)?;
    Ok(builder.build())
}

fn required_str<'a>(ctx: &'a InvocationContext, name: &str) -> anyhow::Result<&'a str> {
    ctx.str_arg(name)
        .ok_or_else(|| anyhow::anyhow!("argument `{name}` was not supplied"))
}

#[cfg(test)]
pub(crate) fn context_for(arguments: serde_json::Value) -> InvocationContext {
    InvocationContext {
        arguments: arguments.as_object().cloned().unwrap_or_default(),
        identity: crate::server::auth::Identity::for_tests("analyst@emu.test"),
        cancellation: tokio_util::sync::CancellationToken::new(),
    }
}
