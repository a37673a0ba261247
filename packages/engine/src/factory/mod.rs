// packages/engine/src/factory/mod.rs
//! Proxy construction and instances
//!
//! - **Proxy Factory**: the construction pipeline from contract to instance
//! - **Instance**: the constructed proxy and its bound slots
//! - **Failure Log**: per-instance journal of invocation failures

pub mod failure_log;
pub mod instance;
pub mod proxy_factory;

// Re-export commonly used types
pub use failure_log::{FailureKind, FailureLog, FailureRecord};
pub use instance::{ProxyInstance, ProxySlots};
pub use proxy_factory::{new_proxy_instance, ProxyFactory};
