#![forbid(unsafe_code)]

use shop_kernel_contracts::joborder::JobOrderStatus;
use shop_kernel_contracts::ReasonCodeId;
use thiserror::Error;

/// Which kind of record a `NotFound` refers to. Never says which tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    JobOrder,
    Actor,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::JobOrder => "job order",
            EntityKind::Actor => "actor",
        }
    }
}

/// Every way `request_transition` can fail. All four are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobOrderError {
    /// Absent, or owned by another tenant; callers cannot tell which.
    #[error("{} not found", .entity.as_str())]
    NotFound { entity: EntityKind },

    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition {
        from: JobOrderStatus,
        to: JobOrderStatus,
    },

    #[error("actor lacks '{required_permission}' or is not allowed to act")]
    Forbidden {
        required_permission: &'static str,
        reason_code: ReasonCodeId,
    },

    /// Lost a concurrent compare-and-set; reload and retry.
    #[error("job order changed concurrently: expected {expected}, observed {observed}")]
    Conflict {
        expected: JobOrderStatus,
        observed: JobOrderStatus,
    },
}

impl JobOrderError {
    pub fn kind(&self) -> &'static str {
        match self {
            JobOrderError::NotFound { .. } => "not_found",
            JobOrderError::InvalidTransition { .. } => "invalid_transition",
            JobOrderError::Forbidden { .. } => "forbidden",
            JobOrderError::Conflict { .. } => "conflict",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, JobOrderError::Conflict { .. })
    }

    pub(crate) fn job_order_not_found() -> Self {
        JobOrderError::NotFound {
            entity: EntityKind::JobOrder,
        }
    }

    pub(crate) fn actor_not_found() -> Self {
        JobOrderError::NotFound {
            entity: EntityKind::Actor,
        }
    }
}
