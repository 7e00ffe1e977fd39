use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::lib::errors::ConfigError;

pub const DEFAULT_HANDLER_TIMEOUT_SECS: u64 = 30;
const MAX_HANDLER_TIMEOUT_SECS: u64 = 600;

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchSection {
    /// Upper bound on a single handler run.
    pub handler_timeout: Duration,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(DEFAULT_HANDLER_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawDispatchSection {
    pub handler_timeout_secs: Option<u64>,
}

pub fn parse_dispatch_section(
    raw: Option<RawDispatchSection>,
    path: &Path,
) -> Result<DispatchSection, ConfigError> {
    let raw = raw.unwrap_or_default();
    let secs = raw
        .handler_timeout_secs
        .unwrap_or(DEFAULT_HANDLER_TIMEOUT_SECS);
    if !(1..=MAX_HANDLER_TIMEOUT_SECS).contains(&secs) {
        return Err(ConfigError::InvalidField {
            path: path.to_path_buf(),
            field: "dispatch.handler_timeout_secs",
            message: format!("Use a timeout between 1 and {MAX_HANDLER_TIMEOUT_SECS} seconds"),
        });
    }
    Ok(DispatchSection {
        handler_timeout: Duration::from_secs(secs),
    })
}
