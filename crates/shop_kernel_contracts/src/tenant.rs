#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::validate_id;
use crate::{ContractViolation, Validate};

/// Opaque shop account identifier. Every record carries one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
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

impl Validate for TenantId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("tenant_id", &self.0, 64)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Records that belong to exactly one tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> &TenantId;

    fn belongs_to(&self, tenant_id: &TenantId) -> bool {
        self.tenant_id() == tenant_id
    }
}

impl<T: TenantScoped + ?Sized> TenantScoped for &T {
    fn tenant_id(&self) -> &TenantId {
        (**self).tenant_id()
    }
}

impl<T: TenantScoped + ?Sized> TenantScoped for &mut T {
    fn tenant_id(&self) -> &TenantId {
        (**self).tenant_id()
    }
}
