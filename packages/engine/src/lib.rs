// packages/engine/src/lib.rs
//! Proxy Engine Library
//!
//! Builds, at runtime, objects that satisfy a registered contract while
//! routing every interceptable operation through a caller-supplied
//! invocation handler: the dynamic-proxy pattern without code generation.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **contract**: Contract descriptors, operation metadata, catalogs, values
//! - **synthesis**: Handler contract, fallback skeletons, proxy type definitions
//! - **build**: Dispatch-table loader and single-flight type cache
//! - **factory**: Proxy construction pipeline, instances, failure journal
//! - **observability**: Tracing subscriber and Prometheus recorder setup
//! - **utils**: Error types and configuration
//!
//! # Example
//!
//! ```
//! use proxy_engine::{args, handler_fn, new_proxy_instance, Contract, Operation, TypeRef, Value};
//!
//! let greeter = Contract::pure("app.Greeter")
//!     .operation(Operation::new("greet").param(TypeRef::Str).returns(TypeRef::Str))
//!     .build()
//!     .unwrap();
//!
//! let handler = handler_fn(|_, _, args| {
//!     let name = args[0].as_str().unwrap_or_default();
//!     Ok(Value::Str(format!("Hello, {}", name)))
//! });
//!
//! let proxy = new_proxy_instance(&greeter, handler).unwrap();
//! let greeting: String = proxy.call_as("greet", &args!["Ada"]).unwrap();
//! assert_eq!(greeting, "Hello, Ada");
//! ```

// Public module exports
pub mod build;
pub mod contract;
pub mod factory;
pub mod observability;
pub mod synthesis;
pub mod utils;

// Re-export commonly used types
pub use build::{BuildFailure, BuiltType, CachingLoader, DispatchTableLoader, TypeLoader};
pub use contract::{
    CallScope, Contract, ContractKind, FromValue, IntoValue, Operation, OperationCatalog, Signature,
    TypeRef, Value, Visibility,
};
pub use factory::{new_proxy_instance, FailureRecord, ProxyFactory, ProxyInstance};
pub use synthesis::{handler_fn, Delegate, InvocationHandler, Skeleton, Traced};
pub use utils::config::{EngineConfig, FailurePolicy, ProxyConfig};
pub use utils::errors::{InvocationError, ProxyError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
