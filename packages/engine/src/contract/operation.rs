// packages/engine/src/contract/operation.rs
//! Operation metadata
//!
//! An [`Operation`] is one callable member of a contract. It is identified
//! by its [`Signature`] (name plus parameter types); return type, visibility
//! and modifiers ride along as metadata handed to handlers.

use crate::contract::types::{TypeRef, Value};
use crate::synthesis::skeleton::Skeleton;
use crate::utils::errors::ContractError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Real implementation of an operation
///
/// Instance bodies receive the skeleton they run on; static bodies and
/// bodies of pure contracts receive `None`.
pub type Body = Arc<dyn Fn(Option<&Skeleton>, &[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Operation identity: name plus ordered parameter types
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub params: Vec<TypeRef>,
}

impl Signature {
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = TypeRef>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        f.write_str(")")
    }
}

/// Operation visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// Where a call on a proxy originates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallScope {
    /// Ordinary client code
    External,
    /// Code extending the contract
    Subtype,
    /// The contract's own code
    Internal,
}

impl Visibility {
    pub fn accessible_from(self, scope: CallScope) -> bool {
        match self {
            Visibility::Public => true,
            Visibility::Protected => scope != CallScope::External,
            Visibility::Private => scope == CallScope::Internal,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => f.write_str("public"),
            Visibility::Protected => f.write_str("protected"),
            Visibility::Private => f.write_str("private"),
        }
    }
}

/// Modifier flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_static: bool,
    pub is_native: bool,
}

impl Modifiers {
    /// Final, static and native operations are never forwarded to a handler
    pub fn excludes_interception(&self) -> bool {
        self.is_final || self.is_static || self.is_native
    }
}

/// One callable member of a contract
#[derive(Clone)]
pub struct Operation {
    signature: Signature,
    return_type: TypeRef,
    visibility: Visibility,
    modifiers: Modifiers,
    body: Option<Body>,
    declared_in: String,
}

impl Operation {
    /// Start describing an operation
    #[allow(clippy::new_ret_no_self)]
    pub fn new(name: impl Into<String>) -> OperationBuilder {
        OperationBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn params(&self) -> &[TypeRef] {
        &self.signature.params
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn return_type(&self) -> &TypeRef {
        &self.return_type
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract
    }

    pub fn is_interceptable(&self) -> bool {
        !self.modifiers.excludes_interception()
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Qualified name of the contract that declared this operation
    pub fn declared_in(&self) -> &str {
        &self.declared_in
    }

    /// Check argument count and types against the signature
    pub fn check_args(&self, args: &[Value]) -> Result<Vec<Value>, String> {
        if args.len() != self.signature.arity() {
            return Err(format!(
                "expected {} arguments, got {}",
                self.signature.arity(),
                args.len()
            ));
        }

        args.iter()
            .zip(&self.signature.params)
            .enumerate()
            .map(|(i, (arg, ty))| {
                arg.clone()
                    .conform(ty)
                    .map_err(|e| format!("argument {}: {}", i, e))
            })
            .collect()
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("signature", &self.signature.to_string())
            .field("return_type", &self.return_type)
            .field("visibility", &self.visibility)
            .field("modifiers", &self.modifiers)
            .field("has_body", &self.body.is_some())
            .field("declared_in", &self.declared_in)
            .finish()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.visibility)?;
        if self.modifiers.is_abstract {
            f.write_str("abstract ")?;
        }
        if self.modifiers.is_static {
            f.write_str("static ")?;
        }
        if self.modifiers.is_final {
            f.write_str("final ")?;
        }
        if self.modifiers.is_native {
            f.write_str("native ")?;
        }
        write!(f, "{} -> {}", self.signature, self.return_type)
    }
}

/// Pick the single overload whose parameters accept `args`
///
/// Returns the number of matching candidates when it is not exactly one.
pub fn select_overload<'a>(
    candidates: impl IntoIterator<Item = &'a Arc<Operation>>,
    args: &[Value],
) -> Result<&'a Arc<Operation>, usize> {
    let mut matches = candidates
        .into_iter()
        .filter(|op| op.check_args(args).is_ok());

    match (matches.next(), matches.next()) {
        (Some(op), None) => Ok(op),
        (None, _) => Err(0),
        (Some(_), Some(_)) => Err(2 + matches.count()),
    }
}

/// Builder for [`Operation`]
///
/// An operation without a body is abstract. Final, static and native
/// operations must carry a body.
pub struct OperationBuilder {
    name: String,
    params: Vec<TypeRef>,
    return_type: TypeRef,
    visibility: Visibility,
    modifiers: Modifiers,
    body: Option<Body>,
}

impl OperationBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: TypeRef::Void,
            visibility: Visibility::Public,
            modifiers: Modifiers::default(),
            body: None,
        }
    }

    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn protected(self) -> Self {
        self.visibility(Visibility::Protected)
    }

    pub fn private(self) -> Self {
        self.visibility(Visibility::Private)
    }

    /// Mark abstract explicitly
    pub fn abstract_(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.modifiers.is_final = true;
        self
    }

    pub fn static_(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    /// Host-provided implementation
    pub fn native<F>(mut self, body: F) -> Self
    where
        F: Fn(Option<&Skeleton>, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.modifiers.is_native = true;
        self.body = Some(Arc::new(body));
        self
    }

    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(Option<&Skeleton>, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }

    pub fn signature(&self) -> Signature {
        Signature::new(self.name.clone(), self.params.iter().cloned())
    }

    pub(crate) fn build(self, contract: &str) -> Result<Operation, ContractError> {
        let signature = self.signature();
        let mut modifiers = self.modifiers;

        let invalid = |reason: &str| ContractError::InvalidModifiers {
            contract: contract.to_string(),
            signature: signature.to_string(),
            reason: reason.to_string(),
        };

        if signature.name.is_empty() {
            return Err(invalid("operation name must not be empty"));
        }

        match &self.body {
            None if modifiers.excludes_interception() => {
                return Err(ContractError::MissingBody {
                    contract: contract.to_string(),
                    signature: signature.to_string(),
                });
            }
            None => modifiers.is_abstract = true,
            Some(_) if modifiers.is_abstract => {
                return Err(invalid("abstract operation cannot have a body"));
            }
            Some(_) => {}
        }

        if modifiers.is_abstract && self.visibility == Visibility::Private {
            return Err(invalid("abstract operation cannot be private"));
        }

        Ok(Operation {
            signature,
            return_type: self.return_type,
            visibility: self.visibility,
            modifiers,
            body: self.body,
            declared_in: contract.to_string(),
        })
    }
}
