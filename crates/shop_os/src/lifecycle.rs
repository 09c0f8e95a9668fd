#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use shop_engines::authz::{AccessDecision, AuthorizationGuard};
use shop_engines::joborder::JobOrderTransitionRuntime;
use shop_kernel_contracts::identity::ActorId;
use shop_kernel_contracts::joborder::{
    JobOrderId, JobOrderLifecycleEvent, JobOrderRecord, JobOrderStatus,
};
use shop_kernel_contracts::tenant::TenantId;
use shop_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};
use shop_storage::repo::{IdentityRepo, JobOrderRepo};
use shop_storage::store::{CompareAndSetOutcome, ShopStore};
use tracing::{debug, info, warn};

use crate::config::LifecycleEngineConfig;
use crate::directory::IdentityDirectory;
use crate::error::JobOrderError;
use crate::sink::{LedgerEventSink, LifecycleEventSink};

pub mod reason_codes {
    use shop_kernel_contracts::ReasonCodeId;

    // LIFECYCLE OS wiring reason-code namespace.
    pub const LIFECYCLE_OK_APPLIED: ReasonCodeId = ReasonCodeId(0x4C43_0001);

    pub const LIFECYCLE_JOB_ORDER_NOT_FOUND: ReasonCodeId = ReasonCodeId(0x4C43_0010);
    pub const LIFECYCLE_CAS_CONFLICT: ReasonCodeId = ReasonCodeId(0x4C43_0011);

    pub const LIFECYCLE_EVENT_BUILD_FAILED: ReasonCodeId = ReasonCodeId(0x4C43_00F1);
    pub const LIFECYCLE_EVENT_PUBLISH_FAILED: ReasonCodeId = ReasonCodeId(0x4C43_00F2);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub tenant_id: TenantId,
    pub actor_id: ActorId,
    pub job_order_id: JobOrderId,
    pub target_status: JobOrderStatus,
    pub requested_at: MonotonicTimeNs,
}

impl TransitionRequest {
    pub fn v1(
        tenant_id: TenantId,
        actor_id: ActorId,
        job_order_id: JobOrderId,
        target_status: JobOrderStatus,
        requested_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let req = Self {
            tenant_id,
            actor_id,
            job_order_id,
            target_status,
            requested_at,
        };
        req.validate()?;
        Ok(req)
    }
}

impl Validate for TransitionRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.tenant_id.validate()?;
        self.actor_id.validate()?;
        self.job_order_id.validate()?;
        if self.requested_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "transition_request.requested_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// Owns every status change of a job order.
///
/// `request_transition` runs, in order: tenant-scoped load, table check, actor
/// resolution, authorization, compare-and-set, event publish. A loser of a
/// concurrent compare-and-set gets `Conflict` at once; retrying is the
/// caller's call.
#[derive(Debug)]
pub struct JobOrderLifecycleEngine<J, I, K> {
    config: LifecycleEngineConfig,
    runtime: JobOrderTransitionRuntime,
    job_orders: J,
    directory: IdentityDirectory<I>,
    sink: K,
}

pub type InMemoryLifecycleEngine =
    JobOrderLifecycleEngine<Arc<ShopStore>, Arc<ShopStore>, LedgerEventSink<Arc<ShopStore>>>;

impl InMemoryLifecycleEngine {
    /// Engine whose job orders, identities and lifecycle ledger all live in
    /// `store`.
    pub fn over_store(config: LifecycleEngineConfig, store: Arc<ShopStore>) -> Self {
        Self::new(
            config,
            store.clone(),
            store.clone(),
            LedgerEventSink::new(store),
        )
    }
}

impl<J, I, K> JobOrderLifecycleEngine<J, I, K>
where
    J: JobOrderRepo,
    I: IdentityRepo,
    K: LifecycleEventSink,
{
    pub fn new(config: LifecycleEngineConfig, job_orders: J, identity: I, sink: K) -> Self {
        let guard = AuthorizationGuard::new(config.guard_config());
        Self {
            config,
            runtime: JobOrderTransitionRuntime::new(guard),
            job_orders,
            directory: IdentityDirectory::new(identity),
            sink,
        }
    }

    pub fn config(&self) -> &LifecycleEngineConfig {
        &self.config
    }

    /// Tenant-scoped read of one job order.
    pub fn job_order(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
    ) -> Result<JobOrderRecord, JobOrderError> {
        self.job_orders
            .load_job_order(tenant_id, job_order_id)
            .ok_or_else(JobOrderError::job_order_not_found)
    }

    pub fn request_transition(
        &self,
        req: &TransitionRequest,
    ) -> Result<JobOrderRecord, JobOrderError> {
        let current = match self.job_order(&req.tenant_id, &req.job_order_id) {
            Ok(row) => row,
            Err(err) => {
                debug!(
                    tenant_id = %req.tenant_id,
                    job_order_id = %req.job_order_id,
                    reason_code = reason_codes::LIFECYCLE_JOB_ORDER_NOT_FOUND.0,
                    "job order not found in tenant"
                );
                return Err(err);
            }
        };
        let from = current.status;
        let to = req.target_status;

        let rule = self.runtime.lookup_edge(from, to).map_err(|decision| {
            debug!(
                job_order_id = %req.job_order_id,
                from = %from,
                to = %to,
                reason_code = decision.reason_code().0,
                "transition not in table"
            );
            JobOrderError::InvalidTransition { from, to }
        })?;

        let actor = self.directory.resolve_actor(&req.actor_id, &req.tenant_id)?;

        if let AccessDecision::Deny { reason_code } =
            self.runtime.guard().decide(&actor, rule.required_permission)
        {
            debug!(
                job_order_id = %req.job_order_id,
                actor_id = %req.actor_id,
                required_permission = rule.required_permission,
                reason_code = reason_code.0,
                "transition forbidden"
            );
            return Err(JobOrderError::Forbidden {
                required_permission: rule.required_permission,
                reason_code,
            });
        }

        let updated = match self.job_orders.compare_and_set_status(
            &req.tenant_id,
            &req.job_order_id,
            from,
            to,
            req.requested_at,
        ) {
            CompareAndSetOutcome::Applied(row) => row,
            CompareAndSetOutcome::Stale { observed } => {
                warn!(
                    job_order_id = %req.job_order_id,
                    actor_id = %req.actor_id,
                    expected = %from,
                    observed = %observed,
                    reason_code = reason_codes::LIFECYCLE_CAS_CONFLICT.0,
                    "job order transition lost a concurrent update"
                );
                return Err(JobOrderError::Conflict {
                    expected: from,
                    observed,
                });
            }
            CompareAndSetOutcome::Missing => return Err(JobOrderError::job_order_not_found()),
            CompareAndSetOutcome::Rejected { from, to } => {
                return Err(JobOrderError::InvalidTransition { from, to })
            }
        };

        info!(
            tenant_id = %req.tenant_id,
            job_order_id = %req.job_order_id,
            actor_id = %req.actor_id,
            from = %from,
            to = %to,
            revision = updated.revision,
            reason_code = reason_codes::LIFECYCLE_OK_APPLIED.0,
            "job order transition applied"
        );

        if self.config.emit_lifecycle_events {
            self.publish(&updated, from, &req.actor_id);
        }
        Ok(updated)
    }

    fn publish(&self, updated: &JobOrderRecord, from: JobOrderStatus, actor_id: &ActorId) {
        let event = match JobOrderLifecycleEvent::v1(
            updated.tenant_id.clone(),
            updated.job_order_id.clone(),
            from,
            updated.status,
            actor_id.clone(),
            updated.updated_at,
        ) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    job_order_id = %updated.job_order_id,
                    error = %err,
                    reason_code = reason_codes::LIFECYCLE_EVENT_BUILD_FAILED.0,
                    "lifecycle event could not be built"
                );
                return;
            }
        };
        if let Err(err) = self.sink.publish(&event) {
            warn!(
                job_order_id = %updated.job_order_id,
                error = %err,
                reason_code = reason_codes::LIFECYCLE_EVENT_PUBLISH_FAILED.0,
                "lifecycle event publish failed; transition stands"
            );
        }
    }

    /// Every status reachable from `current` in one step, for UI affordances.
    pub fn allowed_transitions(&self, current: JobOrderStatus) -> BTreeSet<JobOrderStatus> {
        self.runtime.allowed_transitions(current)
    }

    /// The subset of `allowed_transitions` this actor is authorized for, on a
    /// job order in the actor's tenant.
    pub fn allowed_transitions_for_actor(
        &self,
        actor_id: &ActorId,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
    ) -> Result<BTreeSet<JobOrderStatus>, JobOrderError> {
        let current = self.job_order(tenant_id, job_order_id)?;
        let actor = self.directory.resolve_actor(actor_id, tenant_id)?;
        Ok(self.runtime.allowed_transitions_for(&actor, current.status))
    }
}
