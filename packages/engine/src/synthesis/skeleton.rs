// packages/engine/src/synthesis/skeleton.rs
//! Fallback skeleton synthesis
//!
//! A skeleton is an always-instantiable stand-in for a contract: every
//! operation that has a real body keeps it, every abstract operation gets a
//! stub returning the default value of its return type. Handlers receive the
//! skeleton as the receiver of non-abstract operations and may delegate to
//! it.

use crate::contract::catalog::OperationCatalog;
use crate::contract::descriptor::Contract;
use crate::contract::operation::{select_overload, Body, Operation, Signature};
use crate::contract::types::Value;
use crate::utils::errors::{ProxyError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Implementation chosen for one operation of the skeleton
#[derive(Clone)]
pub enum SkeletonSlot {
    /// Body carried over from the contract
    Real { operation: Arc<Operation>, body: Body },

    /// Stub returning the default value of the return type
    Default { operation: Arc<Operation> },
}

impl SkeletonSlot {
    pub fn operation(&self) -> &Arc<Operation> {
        match self {
            SkeletonSlot::Real { operation, .. } | SkeletonSlot::Default { operation } => operation,
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, SkeletonSlot::Default { .. })
    }
}

/// Skeleton type: one slot per catalog entry
#[derive(Clone)]
pub struct SkeletonDefinition {
    contract: Arc<Contract>,
    slots: BTreeMap<Signature, SkeletonSlot>,
}

impl SkeletonDefinition {
    /// Build the skeleton for the catalog's contract
    pub fn synthesize(catalog: &OperationCatalog) -> Result<Self> {
        let contract = Arc::clone(catalog.contract());
        let mut slots = BTreeMap::new();

        for op in catalog.iter() {
            let slot = match (op.is_abstract(), op.body()) {
                (true, _) => SkeletonSlot::Default {
                    operation: Arc::clone(op),
                },
                (false, Some(body)) => SkeletonSlot::Real {
                    operation: Arc::clone(op),
                    body: Arc::clone(body),
                },
                (false, None) => {
                    return Err(ProxyError::Skeleton {
                        contract: contract.name().to_string(),
                        reason: format!("{} is not abstract but has no body", op.signature()),
                    });
                }
            };
            slots.insert(op.signature().clone(), slot);
        }

        let definition = Self { contract, slots };
        debug!(
            "Synthesized skeleton for {}: {} real bodies, {} default stubs",
            definition.contract.name(),
            definition.real_count(),
            definition.stub_count()
        );

        Ok(definition)
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    pub fn slot(&self, signature: &Signature) -> Option<&SkeletonSlot> {
        self.slots.get(signature)
    }

    pub fn slots(&self) -> impl Iterator<Item = &SkeletonSlot> {
        self.slots.values()
    }

    pub fn stub_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.is_stub()).count()
    }

    pub fn real_count(&self) -> usize {
        self.slots.len() - self.stub_count()
    }

    /// Every catalog entry has an implementation
    pub fn is_instantiable(&self, catalog: &OperationCatalog) -> bool {
        catalog
            .signatures()
            .all(|signature| self.slots.contains_key(signature))
    }

    /// Create a fresh skeleton instance
    pub fn instantiate(self: &Arc<Self>) -> Skeleton {
        Skeleton {
            definition: Arc::clone(self),
        }
    }
}

impl fmt::Debug for SkeletonDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkeletonDefinition")
            .field("contract", &self.contract.name())
            .field("real", &self.real_count())
            .field("stubs", &self.stub_count())
            .finish()
    }
}

/// Skeleton instance, the concrete receiver handed to handlers
#[derive(Clone)]
pub struct Skeleton {
    definition: Arc<SkeletonDefinition>,
}

impl Skeleton {
    pub fn contract(&self) -> &Arc<Contract> {
        self.definition.contract()
    }

    pub fn definition(&self) -> &Arc<SkeletonDefinition> {
        &self.definition
    }

    /// Run the skeleton's implementation of an operation
    ///
    /// Static bodies run without a receiver.
    pub fn invoke(&self, signature: &Signature, args: &[Value]) -> anyhow::Result<Value> {
        let slot = self.definition.slot(signature).ok_or_else(|| {
            anyhow::anyhow!("{} has no operation {}", self.contract().name(), signature)
        })?;

        match slot {
            SkeletonSlot::Real { operation, body } => {
                let receiver = if operation.modifiers().is_static {
                    None
                } else {
                    Some(self)
                };
                body(receiver, args)
            }
            SkeletonSlot::Default { operation } => {
                Ok(Value::default_for(operation.return_type()))
            }
        }
    }

    /// Call an operation by name, picking the overload that accepts `args`
    pub fn call(&self, name: &str, args: &[Value]) -> anyhow::Result<Value> {
        let candidates: Vec<&Arc<Operation>> = self
            .definition
            .slots()
            .map(SkeletonSlot::operation)
            .filter(|op| op.name() == name)
            .collect();

        let op = select_overload(candidates.iter().copied(), args).map_err(|count| {
            anyhow::anyhow!(
                "{} candidates for {}.{} with {} args",
                count,
                self.contract().name(),
                name,
                args.len()
            )
        })?;
        self.invoke(op.signature(), args)
    }
}

impl fmt::Debug for Skeleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skeleton")
            .field("contract", &self.contract().name())
            .finish()
    }
}
