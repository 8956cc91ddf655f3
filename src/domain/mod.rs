//! Domain layer for the mapsmith orchestration core
//!
//! This module contains the data model and the ports external
//! collaborators are consumed through.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
