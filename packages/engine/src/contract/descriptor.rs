// packages/engine/src/contract/descriptor.rs
//! Contract descriptors
//!
//! Contracts are registered explicitly: a builder lists the operations a
//! contract declares and the supertypes it inherits from. Pure contracts
//! play the role of interfaces; concrete contracts are extensible base
//! types whose operations may carry real bodies.

use crate::contract::operation::{Operation, OperationBuilder, Signature, Visibility};
use crate::utils::errors::ContractError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Kind of contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// Behavior only (an interface)
    Pure,
    /// Extensible base type
    Concrete,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKind::Pure => f.write_str("pure"),
            ContractKind::Concrete => f.write_str("concrete"),
        }
    }
}

/// A named behavioral type
pub struct Contract {
    name: String,
    kind: ContractKind,
    parent: Option<Arc<Contract>>,
    interfaces: Vec<Arc<Contract>>,
    operations: Vec<Arc<Operation>>,
}

impl Contract {
    /// Describe a pure contract
    pub fn pure(name: impl Into<String>) -> ContractBuilder {
        ContractBuilder::new(name, ContractKind::Pure)
    }

    /// Describe a concrete contract
    pub fn concrete(name: impl Into<String>) -> ContractBuilder {
        ContractBuilder::new(name, ContractKind::Concrete)
    }

    /// Qualified name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last path segment of the qualified name
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit(|c: char| c == '.' || c == ':')
            .next()
            .unwrap_or(&self.name)
    }

    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    pub fn is_pure(&self) -> bool {
        self.kind == ContractKind::Pure
    }

    /// Concrete supertype, if any
    pub fn parent(&self) -> Option<&Arc<Contract>> {
        self.parent.as_ref()
    }

    /// Pure supertypes
    pub fn interfaces(&self) -> &[Arc<Contract>] {
        &self.interfaces
    }

    /// Direct supertypes, parent first
    pub fn supertypes(&self) -> impl Iterator<Item = &Arc<Contract>> {
        self.parent.iter().chain(self.interfaces.iter())
    }

    /// Operations declared on this contract itself, in declaration order
    pub fn declared_operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    pub fn declared(&self, signature: &Signature) -> Option<&Arc<Operation>> {
        self.operations.iter().find(|op| op.signature() == signature)
    }

    /// This contract or the nearest supertype declaring `signature` final
    pub fn final_declaration(&self, signature: &Signature) -> Option<&Contract> {
        let sealed = self
            .declared(signature)
            .map_or(false, |op| op.modifiers().is_final && op.visibility() != Visibility::Private);
        if sealed {
            return Some(self);
        }
        self.supertypes()
            .find_map(|supertype| supertype.final_declaration(signature))
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field(
                "interfaces",
                &self.interfaces.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field("operations", &self.operations)
            .finish()
    }
}

/// Builder for [`Contract`]
pub struct ContractBuilder {
    name: String,
    kind: ContractKind,
    parent: Option<Arc<Contract>>,
    interfaces: Vec<Arc<Contract>>,
    operations: Vec<OperationBuilder>,
}

impl ContractBuilder {
    fn new(name: impl Into<String>, kind: ContractKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            interfaces: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Inherit from a concrete contract
    pub fn extends(mut self, parent: Arc<Contract>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Inherit from a pure contract
    pub fn implements(mut self, interface: Arc<Contract>) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn operation(mut self, operation: OperationBuilder) -> Self {
        self.operations.push(operation);
        self
    }

    /// Validate and freeze the descriptor
    pub fn build(self) -> Result<Arc<Contract>, ContractError> {
        if self.name.trim().is_empty() {
            return Err(ContractError::InvalidName {
                contract: self.name,
            });
        }

        if let Some(parent) = &self.parent {
            if self.kind == ContractKind::Pure {
                return Err(
                    self.supertype_error(parent, "pure contracts cannot extend a concrete type")
                );
            }
            if parent.is_pure() {
                return Err(self.supertype_error(parent, "use implements for pure supertypes"));
            }
        }

        if let Some(concrete) = self.interfaces.iter().find(|i| !i.is_pure()) {
            return Err(self.supertype_error(concrete, "only pure contracts can be implemented"));
        }

        let mut seen = HashSet::new();
        let mut operations = Vec::with_capacity(self.operations.len());
        for builder in self.operations {
            let signature = builder.signature();
            if !seen.insert(signature.clone()) {
                return Err(ContractError::DuplicateOperation {
                    contract: self.name,
                    signature: signature.to_string(),
                });
            }
            let op = builder.build(&self.name)?;

            let invalid = |reason: String| ContractError::InvalidModifiers {
                contract: self.name.clone(),
                signature: signature.to_string(),
                reason,
            };

            // Receivers exist only for concrete contracts
            if self.kind == ContractKind::Pure && op.body().is_some() && !op.modifiers().is_static {
                return Err(invalid(
                    "pure contracts can only carry bodies on static operations".to_string(),
                ));
            }

            if let Some(owner) = self
                .parent
                .iter()
                .chain(self.interfaces.iter())
                .find_map(|supertype| supertype.final_declaration(&signature))
            {
                return Err(invalid(format!(
                    "cannot override final operation of {}",
                    owner.name()
                )));
            }

            operations.push(Arc::new(op));
        }

        debug!(
            "Registered {} contract {} with {} declared operations",
            self.kind,
            self.name,
            operations.len()
        );

        Ok(Arc::new(Contract {
            name: self.name,
            kind: self.kind,
            parent: self.parent,
            interfaces: self.interfaces,
            operations,
        }))
    }

    fn supertype_error(&self, supertype: &Contract, reason: &str) -> ContractError {
        ContractError::InvalidSupertype {
            contract: self.name.clone(),
            supertype: supertype.name().to_string(),
            reason: reason.to_string(),
        }
    }
}
