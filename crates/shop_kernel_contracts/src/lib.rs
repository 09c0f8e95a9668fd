#![forbid(unsafe_code)]

pub mod common;
pub mod identity;
pub mod joborder;
pub mod tenant;

pub use common::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};
