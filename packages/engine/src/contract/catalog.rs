// packages/engine/src/contract/catalog.rs
//! Operation catalog
//!
//! Enumerates every operation visible on a contract: everything it declares
//! (whatever the visibility) plus the public operations of its whole
//! supertype hierarchy. Entries are keyed by [`Signature`], so an operation
//! inherited from several places or re-declared locally appears once.
//!
//! Precedence when the same signature shows up more than once:
//!
//! 1. a local declaration always wins;
//! 2. among inherited entries, one with a body beats an abstract one;
//! 3. otherwise the first one reached wins (parent chain before interfaces).
//!
//! Inherited entries that agree on a signature but not on a return type
//! are a conflict unless the contract re-declares the operation itself.

use crate::contract::descriptor::Contract;
use crate::contract::operation::{Operation, Signature, Visibility};
use crate::contract::types::TypeRef;
use crate::utils::errors::{ProxyError, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Set of operations visible on a contract, keyed by signature
#[derive(Debug, Clone)]
pub struct OperationCatalog {
    contract: Arc<Contract>,
    entries: BTreeMap<Signature, Arc<Operation>>,
}

impl OperationCatalog {
    /// Enumerate the operations of `contract`
    pub fn enumerate(contract: &Arc<Contract>) -> Result<Self> {
        let mut inherited = BTreeMap::new();
        let mut conflicts = BTreeSet::new();
        let mut visited = HashSet::new();

        for supertype in contract.supertypes() {
            collect_public(supertype, &mut inherited, &mut conflicts, &mut visited);
        }

        let mut entries: BTreeMap<Signature, Arc<Operation>> = contract
            .declared_operations()
            .iter()
            .map(|op| (op.signature().clone(), Arc::clone(op)))
            .collect();

        if let Some((signature, returns)) = conflicts
            .iter()
            .find(|(signature, _)| !entries.contains_key(signature))
        {
            return Err(ProxyError::Catalog {
                contract: contract.name().to_string(),
                reason: format!(
                    "inherited operation {} has conflicting return types ({})",
                    signature, returns
                ),
            });
        }

        for (signature, op) in inherited {
            entries.entry(signature).or_insert(op);
        }

        debug!(
            "Enumerated {} operations for {} ({} declared locally)",
            entries.len(),
            contract.name(),
            contract.declared_operations().len()
        );

        Ok(Self {
            contract: Arc::clone(contract),
            entries,
        })
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, signature: &Signature) -> Option<&Arc<Operation>> {
        self.entries.get(signature)
    }

    /// Resolve operation metadata by name and parameter types
    pub fn resolve(&self, name: &str, params: &[TypeRef]) -> Option<&Arc<Operation>> {
        self.entries.get(&Signature::new(name, params.iter().cloned()))
    }

    /// All overloads with the given name
    pub fn by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Arc<Operation>> + 'a {
        self.entries.values().filter(move |op| op.name() == name)
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.entries.contains_key(signature)
    }

    /// Entries in signature order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Operation>> {
        self.entries.values()
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.entries.keys()
    }
}

fn collect_public(
    contract: &Arc<Contract>,
    inherited: &mut BTreeMap<Signature, Arc<Operation>>,
    conflicts: &mut BTreeSet<(Signature, String)>,
    visited: &mut HashSet<*const Contract>,
) {
    // Identity, not name: distinct descriptors may share a qualified name
    if !visited.insert(Arc::as_ptr(contract)) {
        return;
    }

    for op in contract
        .declared_operations()
        .iter()
        .filter(|op| op.visibility() == Visibility::Public)
    {
        let replace = match inherited.get(op.signature()) {
            None => true,
            Some(existing) if existing.return_type() != op.return_type() => {
                conflicts.insert((
                    op.signature().clone(),
                    format!("{} vs {}", existing.return_type(), op.return_type()),
                ));
                false
            }
            Some(existing) => existing.is_abstract() && !op.is_abstract(),
        };

        if replace {
            inherited.insert(op.signature().clone(), Arc::clone(op));
        }
    }

    for supertype in contract.supertypes() {
        collect_public(supertype, inherited, conflicts, visited);
    }
}
