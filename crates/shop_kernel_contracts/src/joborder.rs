#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::validate_id;
use crate::identity::ActorId;
use crate::tenant::{TenantId, TenantScoped};
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const JOBORDER_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const PERM_JOBORDER_START: &str = "joborder.start";
pub const PERM_JOBORDER_COMPLETE: &str = "joborder.complete";
pub const PERM_JOBORDER_INVOICE: &str = "joborder.invoice";
pub const PERM_JOBORDER_CANCEL: &str = "joborder.cancel";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobOrderId(String);

impl JobOrderId {
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

impl Validate for JobOrderId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("job_order_id", &self.0, 128)
    }
}

impl fmt::Display for JobOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOrderStatus {
    Pending,
    InProgress,
    Completed,
    Invoiced,
    Cancelled,
}

impl JobOrderStatus {
    pub const INITIAL: JobOrderStatus = JobOrderStatus::Pending;

    pub const ALL: [JobOrderStatus; 5] = [
        JobOrderStatus::Pending,
        JobOrderStatus::InProgress,
        JobOrderStatus::Completed,
        JobOrderStatus::Invoiced,
        JobOrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobOrderStatus::Pending => "PENDING",
            JobOrderStatus::InProgress => "IN_PROGRESS",
            JobOrderStatus::Completed => "COMPLETED",
            JobOrderStatus::Invoiced => "INVOICED",
            JobOrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// A status is terminal when the transition table has no edge out of it.
    pub fn is_terminal(self) -> bool {
        !JOB_ORDER_TRANSITIONS.iter().any(|rule| rule.from == self)
    }
}

impl fmt::Display for JobOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOrderTransitionRule {
    pub from: JobOrderStatus,
    pub to: JobOrderStatus,
    pub required_permission: &'static str,
}

/// The only source of truth for the job order state machine. Adding a status
/// means adding rows here and nowhere else.
pub const JOB_ORDER_TRANSITIONS: &[JobOrderTransitionRule] = &[
    JobOrderTransitionRule {
        from: JobOrderStatus::Pending,
        to: JobOrderStatus::InProgress,
        required_permission: PERM_JOBORDER_START,
    },
    JobOrderTransitionRule {
        from: JobOrderStatus::Pending,
        to: JobOrderStatus::Cancelled,
        required_permission: PERM_JOBORDER_CANCEL,
    },
    JobOrderTransitionRule {
        from: JobOrderStatus::InProgress,
        to: JobOrderStatus::Completed,
        required_permission: PERM_JOBORDER_COMPLETE,
    },
    JobOrderTransitionRule {
        from: JobOrderStatus::InProgress,
        to: JobOrderStatus::Cancelled,
        required_permission: PERM_JOBORDER_CANCEL,
    },
    JobOrderTransitionRule {
        from: JobOrderStatus::Completed,
        to: JobOrderStatus::Invoiced,
        required_permission: PERM_JOBORDER_INVOICE,
    },
    JobOrderTransitionRule {
        from: JobOrderStatus::Completed,
        to: JobOrderStatus::Cancelled,
        required_permission: PERM_JOBORDER_CANCEL,
    },
];

pub fn transition_rule(
    from: JobOrderStatus,
    to: JobOrderStatus,
) -> Option<&'static JobOrderTransitionRule> {
    JOB_ORDER_TRANSITIONS
        .iter()
        .find(|rule| rule.from == from && rule.to == to)
}

pub fn allowed_transitions(from: JobOrderStatus) -> BTreeSet<JobOrderStatus> {
    JOB_ORDER_TRANSITIONS
        .iter()
        .filter(|rule| rule.from == from)
        .map(|rule| rule.to)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOrderRecord {
    pub schema_version: SchemaVersion,
    pub tenant_id: TenantId,
    pub job_order_id: JobOrderId,
    pub status: JobOrderStatus,
    pub revision: u64,
    pub created_by: ActorId,
    pub assigned_to: Option<ActorId>,
    pub created_at: MonotonicTimeNs,
    pub updated_at: MonotonicTimeNs,
}

impl JobOrderRecord {
    /// Intake: every job order starts out `PENDING` at revision 1.
    pub fn new_pending(
        tenant_id: TenantId,
        job_order_id: JobOrderId,
        created_by: ActorId,
        assigned_to: Option<ActorId>,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: JOBORDER_CONTRACT_VERSION,
            tenant_id,
            job_order_id,
            status: JobOrderStatus::INITIAL,
            revision: 1,
            created_by,
            assigned_to,
            created_at,
            updated_at: created_at,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for JobOrderRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != JOBORDER_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "job_order_record.schema_version",
                reason: "must match JOBORDER_CONTRACT_VERSION",
            });
        }
        self.tenant_id.validate()?;
        self.job_order_id.validate()?;
        self.created_by.validate()?;
        if let Some(assigned_to) = &self.assigned_to {
            assigned_to.validate()?;
        }
        if self.revision == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "job_order_record.revision",
                reason: "must be > 0",
            });
        }
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "job_order_record.created_at",
                reason: "must be > 0",
            });
        }
        if self.updated_at < self.created_at {
            return Err(ContractViolation::InvalidValue {
                field: "job_order_record.updated_at",
                reason: "must be >= created_at",
            });
        }
        Ok(())
    }
}

impl TenantScoped for JobOrderRecord {
    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}

/// Audit record emitted after a transition commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOrderLifecycleEvent {
    pub schema_version: SchemaVersion,
    pub tenant_id: TenantId,
    pub job_order_id: JobOrderId,
    pub from_status: JobOrderStatus,
    pub to_status: JobOrderStatus,
    pub actor_id: ActorId,
    pub occurred_at: MonotonicTimeNs,
}

impl JobOrderLifecycleEvent {
    pub fn v1(
        tenant_id: TenantId,
        job_order_id: JobOrderId,
        from_status: JobOrderStatus,
        to_status: JobOrderStatus,
        actor_id: ActorId,
        occurred_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let ev = Self {
            schema_version: JOBORDER_CONTRACT_VERSION,
            tenant_id,
            job_order_id,
            from_status,
            to_status,
            actor_id,
            occurred_at,
        };
        ev.validate()?;
        Ok(ev)
    }
}

impl Validate for JobOrderLifecycleEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != JOBORDER_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "job_order_lifecycle_event.schema_version",
                reason: "must match JOBORDER_CONTRACT_VERSION",
            });
        }
        self.tenant_id.validate()?;
        self.job_order_id.validate()?;
        self.actor_id.validate()?;
        if transition_rule(self.from_status, self.to_status).is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "job_order_lifecycle_event.to_status",
                reason: "must be a transition listed in JOB_ORDER_TRANSITIONS",
            });
        }
        if self.occurred_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "job_order_lifecycle_event.occurred_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl TenantScoped for JobOrderLifecycleEvent {
    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}
