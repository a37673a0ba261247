// packages/engine/src/utils/mod.rs
//! Shared utilities: error types and configuration

pub mod config;
pub mod errors;

pub use self::config::{EngineConfig, FailurePolicy, LoggingConfig, ProxyConfig};
pub use self::errors::{ContractError, ConversionError, InvocationError, ProxyError, Result, Stage};
