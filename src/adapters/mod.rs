//! Adapters implementing the domain ports.

pub mod compiler;
pub mod converser;
