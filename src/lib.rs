//! mapsmith - generate, validate and correct orchestration of LLM agents
//!
//! For every pairing of an API payload shape and a database entity, agents
//! write two kinds of pure mapping functions: transformers (record to
//! payload) and collectors (payload to write input). Every answer is checked
//! by deterministic validators and fed back to the agent until it converges.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): data model, errors and ports
//! - **Service Layer** (`services`): orchestrators, validators and metrics
//! - **Adapters** (`adapters`): vendor conversers and compilers
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{ArtifactKind, Config, GeneratedArtifact, MappingPlan};
pub use domain::ports::{Compiler, Converser};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AgentContext, MappingPipeline, PipelineReport};
