#![forbid(unsafe_code)]

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{validate_id, validate_text};
use crate::tenant::{TenantId, TenantScoped};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const IDENTITY_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const MAX_ROLES_PER_USER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = id.into();
        let v = Self(id);
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for ActorId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("actor_id", &self.0, 64)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Result<Self, ContractViolation> {
        let name = name.into();
        let v = Self(name);
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for RoleName {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("role_name", &self.0, 64)
    }
}

/// Capability string gating one action, e.g. `joborder.start`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionToken(String);

impl PermissionToken {
    pub fn new(token: impl Into<String>) -> Result<Self, ContractViolation> {
        let token = token.into();
        let v = Self(token);
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for PermissionToken {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("permission_token", &self.0, 96)?;
        if self
            .0
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' || c == ':'))
        {
            return Err(ContractViolation::InvalidValue {
                field: "permission_token",
                reason: "must contain token-safe ASCII only",
            });
        }
        Ok(())
    }
}

// Ord/Eq on the newtype match `str`, so set lookups by `&str` are sound.
impl Borrow<str> for PermissionToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored user row. Permissions are never stored here; they are derived from
/// `roles` at lookup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub schema_version: SchemaVersion,
    pub tenant_id: TenantId,
    pub actor_id: ActorId,
    pub email: String,
    pub display_name: String,
    pub active: bool,
    pub email_verified: bool,
    pub roles: Vec<RoleName>,
    pub last_login_at: Option<MonotonicTimeNs>,
}

impl UserRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn v1(
        tenant_id: TenantId,
        actor_id: ActorId,
        email: String,
        display_name: String,
        active: bool,
        email_verified: bool,
        roles: Vec<RoleName>,
        last_login_at: Option<MonotonicTimeNs>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: IDENTITY_CONTRACT_VERSION,
            tenant_id,
            actor_id,
            email,
            display_name,
            active,
            email_verified,
            roles,
            last_login_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for UserRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != IDENTITY_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "user_record.schema_version",
                reason: "must match IDENTITY_CONTRACT_VERSION",
            });
        }
        self.tenant_id.validate()?;
        self.actor_id.validate()?;
        validate_id("user_record.email", &self.email, 254)?;
        if !self.email.contains('@') {
            return Err(ContractViolation::InvalidValue {
                field: "user_record.email",
                reason: "must contain '@'",
            });
        }
        validate_text("user_record.display_name", &self.display_name, 128)?;
        validate_roles("user_record.roles", &self.roles)?;
        if let Some(t) = self.last_login_at {
            if t.0 == 0 {
                return Err(ContractViolation::InvalidValue {
                    field: "user_record.last_login_at",
                    reason: "must be > 0 when present",
                });
            }
        }
        Ok(())
    }
}

impl TenantScoped for UserRecord {
    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

pub fn validate_roles(field: &'static str, roles: &[RoleName]) -> Result<(), ContractViolation> {
    if roles.len() > MAX_ROLES_PER_USER {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must contain <= 32 roles",
        });
    }
    let mut seen = BTreeSet::new();
    for role in roles {
        role.validate()?;
        if !seen.insert(role) {
            return Err(ContractViolation::InvalidValue {
                field,
                reason: "must not contain duplicate roles",
            });
        }
    }
    Ok(())
}

/// An authenticated user as seen by the authorization guard: the stored user
/// plus the permission set flattened from its current roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    tenant_id: TenantId,
    actor_id: ActorId,
    active: bool,
    email_verified: bool,
    roles: Vec<RoleName>,
    permissions: BTreeSet<PermissionToken>,
}

impl Actor {
    /// Flattens `user.roles` through `role_permissions`. The result is the
    /// union over all roles; a role the lookup does not know contributes
    /// nothing.
    pub fn resolve<F>(user: &UserRecord, mut role_permissions: F) -> Self
    where
        F: FnMut(&RoleName) -> BTreeSet<PermissionToken>,
    {
        let permissions = user
            .roles
            .iter()
            .flat_map(|role| role_permissions(role))
            .collect();
        Self {
            tenant_id: user.tenant_id.clone(),
            actor_id: user.actor_id.clone(),
            active: user.active,
            email_verified: user.email_verified,
            roles: user.roles.clone(),
            permissions,
        }
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified
    }

    pub fn roles(&self) -> &[RoleName] {
        &self.roles
    }

    pub fn permissions(&self) -> &BTreeSet<PermissionToken> {
        &self.permissions
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

impl TenantScoped for Actor {
    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}
