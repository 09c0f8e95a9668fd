#![forbid(unsafe_code)]

use shop_kernel_contracts::identity::{Actor, ActorId};
use shop_kernel_contracts::tenant::TenantId;
use shop_storage::repo::IdentityRepo;
use tracing::debug;

use crate::error::JobOrderError;

/// Identity Directory adapter over an identity store.
///
/// Permissions are flattened from the user's roles on every call, so a role
/// reassignment is visible to the next resolution.
#[derive(Debug, Clone)]
pub struct IdentityDirectory<R> {
    repo: R,
}

impl<R> IdentityDirectory<R>
where
    R: IdentityRepo,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn resolve_actor(
        &self,
        actor_id: &ActorId,
        tenant_id: &TenantId,
    ) -> Result<Actor, JobOrderError> {
        let Some(user) = self.repo.load_user(tenant_id, actor_id) else {
            debug!(tenant_id = %tenant_id, actor_id = %actor_id, "actor not resolvable in tenant");
            return Err(JobOrderError::actor_not_found());
        };
        Ok(Actor::resolve(&user, |role| {
            self.repo.load_role_permissions(role)
        }))
    }
}
