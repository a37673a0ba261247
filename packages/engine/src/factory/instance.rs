// packages/engine/src/factory/instance.rs
//! Proxy instances
//!
//! A [`ProxyInstance`] pairs a built type with its bound slots: the
//! handler, the optional skeleton, the failure policy and the failure
//! journal. All of them are fixed at construction.

use crate::build::loader::{BuiltType, DispatchEntry};
use crate::contract::descriptor::Contract;
use crate::contract::operation::{select_overload, CallScope, Operation, Signature};
use crate::contract::types::{FromValue, Value};
use crate::factory::failure_log::{FailureLog, FailureRecord};
use crate::synthesis::handler::InvocationHandler;
use crate::synthesis::skeleton::Skeleton;
use crate::utils::config::FailurePolicy;
use crate::utils::errors::InvocationError;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use ulid::Ulid;

/// Values bound into a proxy at construction
pub struct ProxySlots {
    handler: Arc<dyn InvocationHandler>,
    skeleton: Option<Skeleton>,
    policy: FailurePolicy,
    failures: FailureLog,
}

impl ProxySlots {
    pub fn new(
        handler: Arc<dyn InvocationHandler>,
        skeleton: Option<Skeleton>,
        policy: FailurePolicy,
        failure_log_capacity: usize,
    ) -> Self {
        Self {
            handler,
            skeleton,
            policy,
            failures: FailureLog::new(failure_log_capacity),
        }
    }

    pub fn handler(&self) -> &dyn InvocationHandler {
        self.handler.as_ref()
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }
}

struct InstanceState {
    id: Ulid,
    built: Arc<BuiltType>,
    slots: ProxySlots,
}

/// Object satisfying a contract, every interceptable call routed through
/// its handler
///
/// Clones share the same state.
#[derive(Clone)]
pub struct ProxyInstance {
    state: Arc<InstanceState>,
}

impl ProxyInstance {
    pub(crate) fn new(built: Arc<BuiltType>, slots: ProxySlots) -> Self {
        Self {
            state: Arc::new(InstanceState {
                id: Ulid::new(),
                built,
                slots,
            }),
        }
    }

    pub fn id(&self) -> Ulid {
        self.state.id
    }

    pub fn contract(&self) -> &Arc<Contract> {
        self.state.built.contract()
    }

    pub fn type_name(&self) -> &str {
        self.state.built.type_name()
    }

    pub fn built_type(&self) -> &Arc<BuiltType> {
        &self.state.built
    }

    pub fn policy(&self) -> FailurePolicy {
        self.state.slots.policy()
    }

    /// Skeleton bound to this instance, if the contract is concrete
    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.state.slots.skeleton()
    }

    /// Metadata of every operation the instance exposes
    pub fn operations(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.state.built.entries().map(DispatchEntry::operation)
    }

    /// Whether calls to `signature` reach the handler
    pub fn is_forwarded(&self, signature: &Signature) -> bool {
        self.state
            .built
            .entry(signature)
            .map_or(false, DispatchEntry::is_forwarded)
    }

    /// Invoke the operation with an exact signature from client code
    pub fn invoke(&self, signature: &Signature, args: &[Value]) -> Result<Value, InvocationError> {
        self.invoke_scoped(CallScope::External, signature, args)
    }

    pub fn invoke_scoped(
        &self,
        scope: CallScope,
        signature: &Signature,
        args: &[Value],
    ) -> Result<Value, InvocationError> {
        let entry = self
            .state
            .built
            .entry(signature)
            .ok_or_else(|| InvocationError::UnknownOperation {
                contract: self.contract().name().to_string(),
                operation: signature.to_string(),
            })?;
        self.dispatch(scope, entry, args)
    }

    /// Call an operation by name from client code, resolving overloads
    /// against the arguments
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, InvocationError> {
        self.call_scoped(CallScope::External, name, args)
    }

    /// Like [`call`](Self::call), converting the result to `R`
    pub fn call_as<R: FromValue>(&self, name: &str, args: &[Value]) -> Result<R, InvocationError> {
        let value = self.call(name, args)?;
        R::from_value(value).map_err(|source| InvocationError::ReturnType {
            operation: name.to_string(),
            source,
        })
    }

    /// Call by name from the given scope, enforcing visibility
    pub fn call_scoped(
        &self,
        scope: CallScope,
        name: &str,
        args: &[Value],
    ) -> Result<Value, InvocationError> {
        let candidates: Vec<&Arc<Operation>> = self
            .operations()
            .filter(|op| op.name() == name)
            .collect();

        if candidates.is_empty() {
            return Err(InvocationError::UnknownOperation {
                contract: self.contract().name().to_string(),
                operation: name.to_string(),
            });
        }

        let op = match candidates.as_slice() {
            // A single candidate reports its own argument errors
            [only] => *only,
            _ => select_overload(candidates.iter().copied(), args).map_err(|count| {
                if count == 0 {
                    InvocationError::Arguments {
                        operation: name.to_string(),
                        reason: format!("no overload accepts {} arguments given", args.len()),
                    }
                } else {
                    InvocationError::Ambiguous {
                        operation: name.to_string(),
                        candidates: count,
                    }
                }
            })?,
        };

        self.invoke_scoped(scope, op.signature(), args)
    }

    /// Snapshot of recorded invocation failures, oldest first
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.state.slots.failures().snapshot()
    }

    pub fn failure_log(&self) -> &FailureLog {
        self.state.slots.failures()
    }

    fn dispatch(
        &self,
        scope: CallScope,
        entry: &DispatchEntry,
        args: &[Value],
    ) -> Result<Value, InvocationError> {
        let op = entry.operation();
        if !op.visibility().accessible_from(scope) {
            return Err(InvocationError::NotAccessible {
                operation: op.signature().to_string(),
            });
        }

        trace!(
            "{} {} {}",
            self.type_name(),
            if entry.is_forwarded() { "forward" } else { "direct" },
            op.signature()
        );
        entry.call(&self.state.slots, args)
    }
}

impl fmt::Debug for ProxyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyInstance")
            .field("id", &self.state.id.to_string())
            .field("type_name", &self.type_name())
            .field("policy", &self.policy())
            .finish()
    }
}
