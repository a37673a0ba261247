// packages/engine/src/build/mod.rs
//! Build/load of proxy types
//!
//! - **Loader**: validates a type definition and compiles it to a dispatch table
//! - **Cache**: single-flight memoization of built types per contract

pub mod cache;
pub mod loader;

pub use cache::{CacheStats, CachingLoader};
pub use loader::{
    BuildFailure, BuiltType, Diagnostic, Dispatch, DispatchEntry, DispatchTableLoader, Severity,
    SlotLayout, TypeLoader,
};
