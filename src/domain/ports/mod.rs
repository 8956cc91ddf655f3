//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - Converser: LLM vendor round trips
//! - Compiler: external type checking of generated artifacts
//!
//! The entity schema and target shape sources are read-only in-memory
//! catalogs (`SchemaCatalog`, `ShapeCatalog`) and need no port.

pub mod compiler;
pub mod converser;

pub use compiler::Compiler;
pub use converser::Converser;
