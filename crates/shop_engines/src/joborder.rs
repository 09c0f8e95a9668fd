#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use shop_kernel_contracts::identity::Actor;
use shop_kernel_contracts::joborder::{
    allowed_transitions, transition_rule, JobOrderStatus, JobOrderTransitionRule,
};
use shop_kernel_contracts::ReasonCodeId;

use crate::authz::{AccessDecision, AuthorizationGuard};

pub mod reason_codes {
    use shop_kernel_contracts::ReasonCodeId;

    // JOBORDER reason-code namespace.
    pub const JOBORDER_OK_TRANSITION_PERMITTED: ReasonCodeId = ReasonCodeId(0x4A4F_0001);

    pub const JOBORDER_TRANSITION_NOT_IN_TABLE: ReasonCodeId = ReasonCodeId(0x4A4F_0010);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDecision {
    Permitted {
        rule: &'static JobOrderTransitionRule,
    },
    InvalidTransition {
        from: JobOrderStatus,
        to: JobOrderStatus,
    },
    Forbidden {
        required_permission: &'static str,
        reason_code: ReasonCodeId,
    },
}

impl TransitionDecision {
    pub fn reason_code(self) -> ReasonCodeId {
        match self {
            TransitionDecision::Permitted { .. } => reason_codes::JOBORDER_OK_TRANSITION_PERMITTED,
            TransitionDecision::InvalidTransition { .. } => {
                reason_codes::JOBORDER_TRANSITION_NOT_IN_TABLE
            }
            TransitionDecision::Forbidden { reason_code, .. } => reason_code,
        }
    }
}

/// Pure evaluation of one requested edge: table lookup, then the guard.
/// Holds no job order state; the caller supplies the observed status.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobOrderTransitionRuntime {
    guard: AuthorizationGuard,
}

impl JobOrderTransitionRuntime {
    pub fn new(guard: AuthorizationGuard) -> Self {
        Self { guard }
    }

    pub fn guard(&self) -> &AuthorizationGuard {
        &self.guard
    }

    pub fn lookup_edge(
        &self,
        from: JobOrderStatus,
        to: JobOrderStatus,
    ) -> Result<&'static JobOrderTransitionRule, TransitionDecision> {
        transition_rule(from, to).ok_or(TransitionDecision::InvalidTransition { from, to })
    }

    pub fn evaluate(
        &self,
        actor: &Actor,
        from: JobOrderStatus,
        to: JobOrderStatus,
    ) -> TransitionDecision {
        let rule = match self.lookup_edge(from, to) {
            Ok(rule) => rule,
            Err(invalid) => return invalid,
        };
        match self.guard.decide(actor, rule.required_permission) {
            AccessDecision::Allow => TransitionDecision::Permitted { rule },
            AccessDecision::Deny { reason_code } => TransitionDecision::Forbidden {
                required_permission: rule.required_permission,
                reason_code,
            },
        }
    }

    pub fn allowed_transitions(&self, from: JobOrderStatus) -> BTreeSet<JobOrderStatus> {
        allowed_transitions(from)
    }

    /// Targets from `from` that `actor` may trigger right now.
    pub fn allowed_transitions_for(
        &self,
        actor: &Actor,
        from: JobOrderStatus,
    ) -> BTreeSet<JobOrderStatus> {
        allowed_transitions(from)
            .into_iter()
            .filter(|to| {
                matches!(
                    self.evaluate(actor, from, *to),
                    TransitionDecision::Permitted { .. }
                )
            })
            .collect()
    }
}
