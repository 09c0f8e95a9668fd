#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use shop_kernel_contracts::identity::{ActorId, PermissionToken, RoleName, UserRecord};
use shop_kernel_contracts::joborder::{
    JobOrderId, JobOrderLifecycleEvent, JobOrderRecord, JobOrderStatus,
};
use shop_kernel_contracts::tenant::TenantId;
use shop_kernel_contracts::MonotonicTimeNs;

use crate::store::{CompareAndSetOutcome, LifecycleLedgerRow, ShopStore, StorageError};

/// Typed repository interface for job order persistence.
///
/// Every read takes the caller's tenant and answers `None` for rows owned by
/// any other tenant.
pub trait JobOrderRepo: Send + Sync {
    fn load_job_order(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
    ) -> Option<JobOrderRecord>;

    fn compare_and_set_status(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
        expected: JobOrderStatus,
        next: JobOrderStatus,
        now: MonotonicTimeNs,
    ) -> CompareAndSetOutcome;
}

/// Typed repository interface for the identity store.
pub trait IdentityRepo: Send + Sync {
    fn load_user(&self, tenant_id: &TenantId, actor_id: &ActorId) -> Option<UserRecord>;
    fn load_role_permissions(&self, role: &RoleName) -> BTreeSet<PermissionToken>;
}

/// Typed repository interface for the append-only lifecycle ledger.
pub trait LifecycleLedgerRepo: Send + Sync {
    fn append_lifecycle_row(&self, event: JobOrderLifecycleEvent) -> Result<u64, StorageError>;
    fn lifecycle_rows(&self, tenant_id: &TenantId, job_order_id: &JobOrderId)
        -> Vec<LifecycleLedgerRow>;
}

impl JobOrderRepo for ShopStore {
    fn load_job_order(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
    ) -> Option<JobOrderRecord> {
        self.job_order_row(tenant_id, job_order_id)
    }

    fn compare_and_set_status(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
        expected: JobOrderStatus,
        next: JobOrderStatus,
        now: MonotonicTimeNs,
    ) -> CompareAndSetOutcome {
        self.compare_and_set_job_order_status(tenant_id, job_order_id, expected, next, now)
    }
}

impl IdentityRepo for ShopStore {
    fn load_user(&self, tenant_id: &TenantId, actor_id: &ActorId) -> Option<UserRecord> {
        self.user_row(tenant_id, actor_id)
    }

    fn load_role_permissions(&self, role: &RoleName) -> BTreeSet<PermissionToken> {
        self.role_permissions(role)
    }
}

impl LifecycleLedgerRepo for ShopStore {
    fn append_lifecycle_row(&self, event: JobOrderLifecycleEvent) -> Result<u64, StorageError> {
        self.append_lifecycle_event_row(event)
    }

    fn lifecycle_rows(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
    ) -> Vec<LifecycleLedgerRow> {
        self.lifecycle_rows_for_job_order(tenant_id, job_order_id)
    }
}

impl<T: JobOrderRepo + ?Sized> JobOrderRepo for Arc<T> {
    fn load_job_order(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
    ) -> Option<JobOrderRecord> {
        (**self).load_job_order(tenant_id, job_order_id)
    }

    fn compare_and_set_status(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
        expected: JobOrderStatus,
        next: JobOrderStatus,
        now: MonotonicTimeNs,
    ) -> CompareAndSetOutcome {
        (**self).compare_and_set_status(tenant_id, job_order_id, expected, next, now)
    }
}

impl<T: IdentityRepo + ?Sized> IdentityRepo for Arc<T> {
    fn load_user(&self, tenant_id: &TenantId, actor_id: &ActorId) -> Option<UserRecord> {
        (**self).load_user(tenant_id, actor_id)
    }

    fn load_role_permissions(&self, role: &RoleName) -> BTreeSet<PermissionToken> {
        (**self).load_role_permissions(role)
    }
}

impl<T: LifecycleLedgerRepo + ?Sized> LifecycleLedgerRepo for Arc<T> {
    fn append_lifecycle_row(&self, event: JobOrderLifecycleEvent) -> Result<u64, StorageError> {
        (**self).append_lifecycle_row(event)
    }

    fn lifecycle_rows(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
    ) -> Vec<LifecycleLedgerRow> {
        (**self).lifecycle_rows(tenant_id, job_order_id)
    }
}
