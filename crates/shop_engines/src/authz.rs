#![forbid(unsafe_code)]

use shop_kernel_contracts::identity::Actor;
use shop_kernel_contracts::ReasonCodeId;

pub mod reason_codes {
    use shop_kernel_contracts::ReasonCodeId;

    // AUTHZ reason-code namespace.
    pub const AUTHZ_OK_ALLOW: ReasonCodeId = ReasonCodeId(0x415A_0001);

    pub const AUTHZ_ACTOR_INACTIVE: ReasonCodeId = ReasonCodeId(0x415A_0010);
    pub const AUTHZ_EMAIL_UNVERIFIED: ReasonCodeId = ReasonCodeId(0x415A_0011);
    pub const AUTHZ_PERMISSION_MISSING: ReasonCodeId = ReasonCodeId(0x415A_0012);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthorizationGuardConfig {
    /// Deny actors whose email is not verified, on top of the active check.
    pub require_email_verified: bool,
}

impl AuthorizationGuardConfig {
    pub fn mvp_v1() -> Self {
        Self {
            require_email_verified: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny { reason_code: ReasonCodeId },
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    pub fn reason_code(self) -> ReasonCodeId {
        match self {
            AccessDecision::Allow => reason_codes::AUTHZ_OK_ALLOW,
            AccessDecision::Deny { reason_code } => reason_code,
        }
    }
}

/// Stateless allow/deny over an already-resolved actor. Fails closed: an
/// inactive actor is denied whatever its permissions say.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGuard {
    config: AuthorizationGuardConfig,
}

impl AuthorizationGuard {
    pub fn new(config: AuthorizationGuardConfig) -> Self {
        Self { config }
    }

    pub fn decide(&self, actor: &Actor, required_permission: &str) -> AccessDecision {
        if !actor.is_active() {
            return AccessDecision::Deny {
                reason_code: reason_codes::AUTHZ_ACTOR_INACTIVE,
            };
        }
        if self.config.require_email_verified && !actor.is_email_verified() {
            return AccessDecision::Deny {
                reason_code: reason_codes::AUTHZ_EMAIL_UNVERIFIED,
            };
        }
        if !actor.has_permission(required_permission) {
            return AccessDecision::Deny {
                reason_code: reason_codes::AUTHZ_PERMISSION_MISSING,
            };
        }
        AccessDecision::Allow
    }

    pub fn authorize(&self, actor: &Actor, required_permission: &str) -> bool {
        self.decide(actor, required_permission).is_allowed()
    }
}
