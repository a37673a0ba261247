// packages/engine/src/synthesis/handler.rs
//! Invocation handler contract
//!
//! A handler sees every forwarded operation call: the receiver (the
//! skeleton when the operation has a real body, `None` otherwise), the
//! operation metadata and the ordered arguments. Whatever it returns becomes
//! the result of the call after conversion to the declared return type.

use crate::contract::operation::Operation;
use crate::contract::types::Value;
use crate::synthesis::skeleton::Skeleton;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Interception capability supplied by the caller of the factory
///
/// Implementations must be `Send + Sync`; concurrent calls on one proxy
/// reach the handler concurrently.
pub trait InvocationHandler: Send + Sync {
    fn invoke(
        &self,
        receiver: Option<&Skeleton>,
        operation: &Operation,
        args: &[Value],
    ) -> anyhow::Result<Value>;
}

impl<F> InvocationHandler for F
where
    F: Fn(Option<&Skeleton>, &Operation, &[Value]) -> anyhow::Result<Value> + Send + Sync,
{
    fn invoke(
        &self,
        receiver: Option<&Skeleton>,
        operation: &Operation,
        args: &[Value],
    ) -> anyhow::Result<Value> {
        self(receiver, operation, args)
    }
}

/// Wrap a closure as a shared handler
pub fn handler_fn<F>(f: F) -> Arc<dyn InvocationHandler>
where
    F: Fn(Option<&Skeleton>, &Operation, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handler that runs the receiver's real body
///
/// Fails when there is no receiver or no real body. Proxies of pure
/// contracts have no receiver; their non-static operations are all abstract.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delegate;

impl InvocationHandler for Delegate {
    fn invoke(
        &self,
        receiver: Option<&Skeleton>,
        operation: &Operation,
        args: &[Value],
    ) -> anyhow::Result<Value> {
        let receiver = receiver
            .ok_or_else(|| anyhow::anyhow!("no receiver for {}", operation.signature()))?;
        receiver.invoke(operation.signature(), args)
    }
}

/// Decorator that traces every call around an inner handler
pub struct Traced<H> {
    inner: H,
}

impl<H: InvocationHandler> Traced<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H: InvocationHandler> InvocationHandler for Traced<H> {
    fn invoke(
        &self,
        receiver: Option<&Skeleton>,
        operation: &Operation,
        args: &[Value],
    ) -> anyhow::Result<Value> {
        let start = Instant::now();
        debug!(
            "Before {}.{} with {} args",
            operation.declared_in(),
            operation.signature(),
            args.len()
        );

        let result = self.inner.invoke(receiver, operation, args);
        match &result {
            Ok(value) => debug!(
                "After {} -> {} ({:?})",
                operation.signature(),
                value,
                start.elapsed()
            ),
            Err(e) => warn!("Handler for {} failed: {:#}", operation.signature(), e),
        }
        result
    }
}
