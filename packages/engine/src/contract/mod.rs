// packages/engine/src/contract/mod.rs
//! Contract description layer
//!
//! Rust has no runtime reflection, so the shape of an intercepted type is
//! registered explicitly:
//!
//! - **Types**: [`TypeRef`] for declared types, [`Value`] for runtime data
//! - **Operation**: signature, return type, visibility, modifiers, body
//! - **Descriptor**: [`Contract`] (pure or concrete) and its supertypes
//! - **Catalog**: deduplicated set of every operation a contract exposes
//!
//! # Example
//!
//! ```ignore
//! let greeter = Contract::pure("app.Greeter")
//!     .operation(Operation::new("greet").param(TypeRef::Str).returns(TypeRef::Str))
//!     .build()?;
//! let catalog = OperationCatalog::enumerate(&greeter)?;
//! ```

pub mod catalog;
pub mod descriptor;
pub mod operation;
pub mod types;

// Re-export commonly used types
pub use catalog::OperationCatalog;
pub use descriptor::{Contract, ContractBuilder, ContractKind};
pub use operation::{
    select_overload, Body, CallScope, Modifiers, Operation, OperationBuilder, Signature, Visibility,
};
pub use types::{FromValue, IntoValue, TypeRef, Value};
