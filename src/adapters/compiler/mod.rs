//! Compiler implementations.

pub mod process;
pub mod scripted;

pub use process::ProcessCompiler;
pub use scripted::ScriptedCompiler;
