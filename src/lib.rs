//! Forklift - parallel batch execution across a bounded pool of worker processes.

pub mod batch;
pub mod config;
pub mod executor;
pub mod hooks;
pub mod logger;
pub mod supervisor;
pub mod worker;

/// Boxed error type carried by per-item actions, item sources and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
