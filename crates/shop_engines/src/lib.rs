#![forbid(unsafe_code)]

pub mod authz;
pub mod joborder;
