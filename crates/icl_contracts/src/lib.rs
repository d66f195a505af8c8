#![forbid(unsafe_code)]

pub mod common;
pub mod identity;
pub mod measurement;
pub mod submission;

pub use common::{ContractViolation, SchemaVersion, Validate};
