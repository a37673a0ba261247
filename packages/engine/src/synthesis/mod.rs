// packages/engine/src/synthesis/mod.rs
//! Proxy synthesis
//!
//! - **Handler**: the interception contract every forwarded call goes through
//! - **Skeleton**: default-value stubs for abstract operations, real bodies kept
//! - **Proxy Type**: forwarding entries for interceptable operations, direct
//!   entries for final/static/native ones
//!
//! # Call routing
//!
//! ```text
//! proxy.call(op, args)
//!     │
//!     ├─ final / static / native ──→ declared body (never intercepted)
//!     │
//!     └─ forwarded ──→ handler.invoke(receiver, op, args)
//!                          │  receiver = None      (abstract op)
//!                          │  receiver = skeleton  (op has a body)
//!                          ↓
//!                     convert to return type
//!                          │
//!                          └─ on failure: propagate, or record + default
//! ```

pub mod handler;
pub mod proxy_type;
pub mod skeleton;

// Re-export commonly used types
pub use handler::{handler_fn, Delegate, InvocationHandler, Traced};
pub use proxy_type::{DirectEntry, ForwardingEntry, ProxyTypeDefinition};
pub use skeleton::{Skeleton, SkeletonDefinition, SkeletonSlot};
