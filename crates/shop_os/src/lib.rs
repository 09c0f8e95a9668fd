#![forbid(unsafe_code)]

pub mod config;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod sink;
