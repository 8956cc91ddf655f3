//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber, with an
//! optional rolling JSON file layer.

pub mod logger;

pub use logger::LoggerImpl;
