#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use shop_kernel_contracts::identity::{
    validate_roles, ActorId, PermissionToken, RoleName, UserRecord,
};
use shop_kernel_contracts::joborder::{
    transition_rule, JobOrderId, JobOrderLifecycleEvent, JobOrderRecord, JobOrderStatus,
};
use shop_kernel_contracts::tenant::{TenantId, TenantScoped};
use shop_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};
use thiserror::Error;
use tracing::debug;

use crate::tenant_guard::{filter_to_tenant, scope_to_tenant};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("foreign key violation on {table}: {key}")]
    ForeignKeyViolation { table: &'static str, key: String },
    #[error("duplicate key on {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("{table} is append-only")]
    AppendOnlyViolation { table: &'static str },
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

/// Result of a conditional status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareAndSetOutcome {
    Applied(JobOrderRecord),
    Stale { observed: JobOrderStatus },
    Missing,
    /// `expected -> next` is not a row of the transition table.
    Rejected {
        from: JobOrderStatus,
        to: JobOrderStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleLedgerRow {
    pub lifecycle_event_id: u64,
    pub event: JobOrderLifecycleEvent,
}

impl TenantScoped for LifecycleLedgerRow {
    fn tenant_id(&self) -> &TenantId {
        &self.event.tenant_id
    }
}

#[derive(Debug)]
struct LifecycleLedger {
    rows: Vec<LifecycleLedgerRow>,
    next_event_id: u64,
}

/// In-memory shop store.
///
/// Job orders sit behind one mutex each; the index lock is only taken for
/// writing on insert. Status writes on different job orders never block each
/// other.
#[derive(Debug)]
pub struct ShopStore {
    job_orders: RwLock<BTreeMap<JobOrderId, Arc<Mutex<JobOrderRecord>>>>,
    users: RwLock<BTreeMap<ActorId, UserRecord>>,
    role_permissions: RwLock<BTreeMap<RoleName, BTreeSet<PermissionToken>>>,
    lifecycle_ledger: Mutex<LifecycleLedger>,
}

impl Default for ShopStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl ShopStore {
    pub fn new_in_memory() -> Self {
        Self {
            job_orders: RwLock::new(BTreeMap::new()),
            users: RwLock::new(BTreeMap::new()),
            role_permissions: RwLock::new(BTreeMap::new()),
            lifecycle_ledger: Mutex::new(LifecycleLedger {
                rows: Vec::new(),
                next_event_id: 1,
            }),
        }
    }

    // ------------------------
    // Identity
    // ------------------------

    pub fn insert_user_row(&self, record: UserRecord) -> Result<(), StorageError> {
        record.validate()?;
        let mut users = self.users.write();
        if users.contains_key(&record.actor_id) {
            return Err(StorageError::DuplicateKey {
                table: "users.actor_id",
                key: record.actor_id.as_str().to_string(),
            });
        }
        users.insert(record.actor_id.clone(), record);
        Ok(())
    }

    pub fn user_row(&self, tenant_id: &TenantId, actor_id: &ActorId) -> Option<UserRecord> {
        let users = self.users.read();
        scope_to_tenant(tenant_id, users.get(actor_id)).cloned()
    }

    pub fn user_rows_for_tenant(&self, tenant_id: &TenantId) -> Vec<UserRecord> {
        let users = self.users.read();
        filter_to_tenant(tenant_id, users.values()).cloned().collect()
    }

    /// Replaces the role list. The next directory lookup sees the new roles.
    pub fn assign_user_roles(
        &self,
        tenant_id: &TenantId,
        actor_id: &ActorId,
        roles: Vec<RoleName>,
    ) -> Result<UserRecord, StorageError> {
        validate_roles("users.roles", &roles)?;
        self.update_user(tenant_id, actor_id, |row| row.roles = roles)
    }

    pub fn set_user_active(
        &self,
        tenant_id: &TenantId,
        actor_id: &ActorId,
        active: bool,
    ) -> Result<UserRecord, StorageError> {
        self.update_user(tenant_id, actor_id, |row| row.active = active)
    }

    pub fn record_user_login(
        &self,
        tenant_id: &TenantId,
        actor_id: &ActorId,
        now: MonotonicTimeNs,
    ) -> Result<UserRecord, StorageError> {
        if now.0 == 0 {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "users.last_login_at",
                    reason: "must be > 0",
                },
            ));
        }
        self.update_user(tenant_id, actor_id, |row| row.last_login_at = Some(now))
    }

    fn update_user<F>(
        &self,
        tenant_id: &TenantId,
        actor_id: &ActorId,
        apply: F,
    ) -> Result<UserRecord, StorageError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut users = self.users.write();
        let Some(row) = scope_to_tenant(tenant_id, users.get_mut(actor_id)) else {
            return Err(StorageError::ForeignKeyViolation {
                table: "users.actor_id",
                key: actor_id.as_str().to_string(),
            });
        };
        let mut next = row.clone();
        apply(&mut next);
        next.validate()?;
        *row = next.clone();
        Ok(next)
    }

    pub fn upsert_role_permissions(
        &self,
        role: RoleName,
        permissions: BTreeSet<PermissionToken>,
    ) -> Result<(), StorageError> {
        role.validate()?;
        for p in &permissions {
            p.validate()?;
        }
        self.role_permissions.write().insert(role, permissions);
        Ok(())
    }

    /// Unknown roles resolve to the empty set.
    pub fn role_permissions(&self, role: &RoleName) -> BTreeSet<PermissionToken> {
        self.role_permissions
            .read()
            .get(role)
            .cloned()
            .unwrap_or_default()
    }

    // ------------------------
    // Job orders
    // ------------------------

    pub fn insert_job_order_row(&self, record: JobOrderRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.user_row(&record.tenant_id, &record.created_by).is_none() {
            return Err(StorageError::ForeignKeyViolation {
                table: "job_orders.created_by",
                key: record.created_by.as_str().to_string(),
            });
        }
        if let Some(assigned_to) = &record.assigned_to {
            if self.user_row(&record.tenant_id, assigned_to).is_none() {
                return Err(StorageError::ForeignKeyViolation {
                    table: "job_orders.assigned_to",
                    key: assigned_to.as_str().to_string(),
                });
            }
        }
        let mut index = self.job_orders.write();
        if index.contains_key(&record.job_order_id) {
            return Err(StorageError::DuplicateKey {
                table: "job_orders.job_order_id",
                key: record.job_order_id.as_str().to_string(),
            });
        }
        index.insert(record.job_order_id.clone(), Arc::new(Mutex::new(record)));
        Ok(())
    }

    fn job_order_slot(&self, job_order_id: &JobOrderId) -> Option<Arc<Mutex<JobOrderRecord>>> {
        self.job_orders.read().get(job_order_id).cloned()
    }

    pub fn job_order_row(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
    ) -> Option<JobOrderRecord> {
        let slot = self.job_order_slot(job_order_id)?;
        let row = slot.lock().clone();
        scope_to_tenant(tenant_id, Some(row))
    }

    pub fn job_order_rows_for_tenant(&self, tenant_id: &TenantId) -> Vec<JobOrderRecord> {
        let slots: Vec<_> = self.job_orders.read().values().cloned().collect();
        let rows: Vec<_> = slots.iter().map(|slot| slot.lock().clone()).collect();
        filter_to_tenant(tenant_id, rows).collect()
    }

    /// Writes `next` only if the stored status still equals `expected`.
    ///
    /// The per-row mutex is held across the compare and the write, so exactly
    /// one of several racing writers with the same `expected` wins. Pairs that
    /// are not in the transition table are rejected before any row is read, so
    /// a terminal status can never be written over.
    pub fn compare_and_set_job_order_status(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
        expected: JobOrderStatus,
        next: JobOrderStatus,
        now: MonotonicTimeNs,
    ) -> CompareAndSetOutcome {
        if transition_rule(expected, next).is_none() {
            debug!(
                job_order_id = %job_order_id,
                from = %expected,
                to = %next,
                "job order status write outside the transition table"
            );
            return CompareAndSetOutcome::Rejected {
                from: expected,
                to: next,
            };
        }
        let Some(slot) = self.job_order_slot(job_order_id) else {
            return CompareAndSetOutcome::Missing;
        };
        let mut row = slot.lock();
        if !row.belongs_to(tenant_id) {
            return CompareAndSetOutcome::Missing;
        }
        if row.status != expected {
            debug!(
                job_order_id = %job_order_id,
                expected = %expected,
                observed = %row.status,
                "job order status compare-and-set lost"
            );
            return CompareAndSetOutcome::Stale {
                observed: row.status,
            };
        }
        row.status = next;
        row.revision = row.revision.saturating_add(1);
        row.updated_at = now.max(row.updated_at);
        CompareAndSetOutcome::Applied(row.clone())
    }

    // ------------------------
    // Lifecycle ledger (append-only)
    // ------------------------

    pub fn append_lifecycle_event_row(
        &self,
        event: JobOrderLifecycleEvent,
    ) -> Result<u64, StorageError> {
        event.validate()?;
        let mut ledger = self.lifecycle_ledger.lock();
        let lifecycle_event_id = ledger.next_event_id;
        ledger.next_event_id = ledger.next_event_id.saturating_add(1);
        ledger.rows.push(LifecycleLedgerRow {
            lifecycle_event_id,
            event,
        });
        Ok(lifecycle_event_id)
    }

    pub fn lifecycle_ledger_rows(&self) -> Vec<LifecycleLedgerRow> {
        self.lifecycle_ledger.lock().rows.clone()
    }

    pub fn lifecycle_rows_for_job_order(
        &self,
        tenant_id: &TenantId,
        job_order_id: &JobOrderId,
    ) -> Vec<LifecycleLedgerRow> {
        let ledger = self.lifecycle_ledger.lock();
        filter_to_tenant(tenant_id, ledger.rows.iter())
            .filter(|row| &row.event.job_order_id == job_order_id)
            .cloned()
            .collect()
    }

    pub fn attempt_overwrite_lifecycle_event_row(
        &self,
        _lifecycle_event_id: u64,
    ) -> Result<(), StorageError> {
        Err(StorageError::AppendOnlyViolation {
            table: "job_order_lifecycle_ledger",
        })
    }
}
