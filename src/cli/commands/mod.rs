//! CLI command implementations.

pub mod check_mapping;
pub mod neighbors;
pub mod run;
