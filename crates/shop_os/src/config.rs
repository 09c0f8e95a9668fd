#![forbid(unsafe_code)]

use serde::Deserialize;
use shop_engines::authz::AuthorizationGuardConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed lifecycle engine config: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleEngineConfig {
    pub emit_lifecycle_events: bool,
    pub require_email_verified: bool,
}

impl Default for LifecycleEngineConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

impl LifecycleEngineConfig {
    pub fn mvp_v1() -> Self {
        Self {
            emit_lifecycle_events: true,
            require_email_verified: false,
        }
    }

    /// Missing keys fall back to `mvp_v1`; unknown keys are rejected.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn guard_config(&self) -> AuthorizationGuardConfig {
        AuthorizationGuardConfig {
            require_email_verified: self.require_email_verified,
        }
    }
}
