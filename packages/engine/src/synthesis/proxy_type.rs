// packages/engine/src/synthesis/proxy_type.rs
//! Proxy type synthesis
//!
//! Turns a catalog into a [`ProxyTypeDefinition`]: one forwarding entry per
//! interceptable operation and one direct entry per final, static or native
//! operation. Forwarding entries carry the per-operation call algorithm, so
//! each operation's declared return type governs conversion and defaults.

use crate::contract::catalog::OperationCatalog;
use crate::contract::descriptor::{Contract, ContractKind};
use crate::contract::operation::{Body, Operation, Visibility};
use crate::contract::types::Value;
use crate::factory::instance::ProxySlots;
use crate::synthesis::skeleton::SkeletonDefinition;
use crate::utils::config::FailurePolicy;
use crate::utils::errors::{InvocationError, ProxyError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Forwarding implementation of one interceptable operation
#[derive(Debug, Clone)]
pub struct ForwardingEntry {
    operation: Arc<Operation>,
    visibility: Visibility,
}

impl ForwardingEntry {
    pub fn new(operation: Arc<Operation>) -> Self {
        let visibility = operation.visibility();
        Self {
            operation,
            visibility,
        }
    }

    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    /// Mirrored from the declared operation
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Route one call through the bound handler
    pub fn forward(
        &self,
        slots: &ProxySlots,
        args: &[Value],
    ) -> std::result::Result<Value, InvocationError> {
        let op = &self.operation;
        let signature = op.signature().to_string();

        let args = op.check_args(args).map_err(|reason| InvocationError::Arguments {
            operation: signature.clone(),
            reason,
        })?;

        // No receiver for abstract operations
        let receiver = if op.is_abstract() {
            None
        } else {
            slots.skeleton()
        };

        metrics::counter!("proxy_invocations_total").increment(1);

        let outcome = slots
            .handler()
            .invoke(receiver, op, &args)
            .map_err(|source| {
                if op.is_abstract() {
                    InvocationError::NotImplemented {
                        operation: signature.clone(),
                        source,
                    }
                } else {
                    InvocationError::Handler {
                        operation: signature.clone(),
                        source,
                    }
                }
            })
            .and_then(|result| {
                if op.return_type().is_void() {
                    Ok(Value::Unit)
                } else {
                    result
                        .conform(op.return_type())
                        .map_err(|source| InvocationError::ReturnType {
                            operation: signature.clone(),
                            source,
                        })
                }
            });

        match outcome {
            Ok(value) => Ok(value),
            Err(err) => {
                metrics::counter!("proxy_invocation_failures_total").increment(1);
                slots.failures().record(op.signature(), &err);

                match slots.policy() {
                    FailurePolicy::Propagate => Err(err),
                    FailurePolicy::Swallow => {
                        warn!("Swallowed failure in {}: {:#}", signature, anyhow::Error::new(err));
                        Ok(Value::default_for(op.return_type()))
                    }
                }
            }
        }
    }
}

/// Final, static or native operation executed as an ordinary call
#[derive(Clone)]
pub struct DirectEntry {
    operation: Arc<Operation>,
    body: Body,
}

impl DirectEntry {
    /// Direct entry for an operation with a body
    pub fn new(operation: Arc<Operation>) -> Option<Self> {
        let body = Arc::clone(operation.body()?);
        Some(Self { operation, body })
    }

    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    /// Run the declared body; its errors are ordinary call errors
    pub fn call(
        &self,
        slots: &ProxySlots,
        args: &[Value],
    ) -> std::result::Result<Value, InvocationError> {
        let op = &self.operation;
        let args = op.check_args(args).map_err(|reason| InvocationError::Arguments {
            operation: op.signature().to_string(),
            reason,
        })?;

        let receiver = if op.modifiers().is_static {
            None
        } else {
            slots.skeleton()
        };

        (self.body)(receiver, &args).map_err(|source| InvocationError::Body {
            operation: op.signature().to_string(),
            source,
        })
    }
}

impl fmt::Debug for DirectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectEntry")
            .field("operation", &self.operation)
            .finish()
    }
}

/// Everything the build step needs to produce a proxy type
#[derive(Debug, Clone)]
pub struct ProxyTypeDefinition {
    type_name: String,
    contract: Arc<Contract>,
    forwarding: Vec<ForwardingEntry>,
    direct: Vec<DirectEntry>,
    skeleton: Option<Arc<SkeletonDefinition>>,
}

impl ProxyTypeDefinition {
    /// Synthesize the proxy type for the catalog's contract
    ///
    /// Concrete contracts must come with their skeleton; pure contracts
    /// must not.
    pub fn synthesize(
        catalog: &OperationCatalog,
        skeleton: Option<Arc<SkeletonDefinition>>,
    ) -> Result<Self> {
        let contract = Arc::clone(catalog.contract());
        let failure = |reason: String| ProxyError::Synthesis {
            contract: contract.name().to_string(),
            reason,
        };

        match (contract.kind(), &skeleton) {
            (ContractKind::Concrete, None) => {
                return Err(failure("concrete contract requires a skeleton".to_string()));
            }
            (ContractKind::Pure, Some(_)) => {
                return Err(failure("pure contract cannot embed a skeleton".to_string()));
            }
            _ => {}
        }

        let mut forwarding = Vec::new();
        let mut direct = Vec::new();
        for op in catalog.iter() {
            if op.is_interceptable() {
                forwarding.push(ForwardingEntry::new(Arc::clone(op)));
                continue;
            }

            let entry = DirectEntry::new(Arc::clone(op)).ok_or_else(|| {
                failure(format!(
                    "{} is excluded from interception but has no body",
                    op.signature()
                ))
            })?;
            direct.push(entry);
        }

        let definition = Self {
            type_name: format!("Proxy${}", contract.simple_name()),
            contract: Arc::clone(&contract),
            forwarding,
            direct,
            skeleton,
        };

        debug!(
            "Synthesized {}: {} forwarding, {} direct",
            definition.type_name,
            definition.forwarding.len(),
            definition.direct.len()
        );

        Ok(definition)
    }

    /// Assemble a definition from parts without synthesis checks
    ///
    /// The loader still validates the result before building it.
    pub fn from_parts(
        type_name: impl Into<String>,
        contract: Arc<Contract>,
        forwarding: Vec<ForwardingEntry>,
        direct: Vec<DirectEntry>,
        skeleton: Option<Arc<SkeletonDefinition>>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            contract,
            forwarding,
            direct,
            skeleton,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    pub fn kind(&self) -> ContractKind {
        self.contract.kind()
    }

    pub fn forwarding(&self) -> &[ForwardingEntry] {
        &self.forwarding
    }

    pub fn direct(&self) -> &[DirectEntry] {
        &self.direct
    }

    pub fn skeleton(&self) -> Option<&Arc<SkeletonDefinition>> {
        self.skeleton.as_ref()
    }
}

impl fmt::Display for ProxyTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "proxy {} for {} {} {{",
            self.type_name,
            self.contract.kind(),
            self.contract.name()
        )?;
        writeln!(f, "    slot handler")?;
        if let Some(skeleton) = &self.skeleton {
            writeln!(
                f,
                "    slot skeleton ({} real, {} stubs)",
                skeleton.real_count(),
                skeleton.stub_count()
            )?;
        }
        for entry in &self.forwarding {
            writeln!(f, "    forward {}", entry.operation)?;
        }
        for entry in &self.direct {
            writeln!(f, "    direct {}", entry.operation)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::types::TypeRef;

    fn widget() -> Arc<Contract> {
        Contract::concrete("ui.Widget")
            .operation(Operation::new("draw"))
            .operation(
                Operation::new("width")
                    .returns(TypeRef::I32)
                    .body(|_, _| Ok(Value::Int(10))),
            )
            .operation(
                Operation::new("id")
                    .returns(TypeRef::I64)
                    .final_()
                    .body(|_, _| Ok(Value::Int(7))),
            )
            .operation(
                Operation::new("count")
                    .returns(TypeRef::I64)
                    .static_()
                    .body(|_, _| Ok(Value::Int(1))),
            )
            .operation(
                Operation::new("hash")
                    .returns(TypeRef::I64)
                    .native(|_, _| Ok(Value::Int(99))),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_exclusions_become_direct_entries() {
        let contract = widget();
        let catalog = OperationCatalog::enumerate(&contract).unwrap();
        let skeleton = Arc::new(SkeletonDefinition::synthesize(&catalog).unwrap());
        let definition = ProxyTypeDefinition::synthesize(&catalog, Some(skeleton)).unwrap();

        let forwarded: Vec<_> = definition
            .forwarding()
            .iter()
            .map(|e| e.operation().name().to_string())
            .collect();
        let mut direct: Vec<_> = definition
            .direct()
            .iter()
            .map(|e| e.operation().name().to_string())
            .collect();
        direct.sort();

        assert_eq!(forwarded.len(), 2);
        assert!(forwarded.contains(&"draw".to_string()));
        assert!(forwarded.contains(&"width".to_string()));
        assert_eq!(direct, vec!["count", "hash", "id"]);
        assert_eq!(definition.type_name(), "Proxy$Widget");
    }

    #[test]
    fn test_visibility_mirrored() {
        let contract = Contract::concrete("ui.Panel")
            .operation(Operation::new("layout").protected())
            .build()
            .unwrap();
        let catalog = OperationCatalog::enumerate(&contract).unwrap();
        let skeleton = Arc::new(SkeletonDefinition::synthesize(&catalog).unwrap());
        let definition = ProxyTypeDefinition::synthesize(&catalog, Some(skeleton)).unwrap();

        assert_eq!(definition.forwarding()[0].visibility(), Visibility::Protected);
    }

    #[test]
    fn test_skeleton_kind_mismatch() {
        let contract = widget();
        let catalog = OperationCatalog::enumerate(&contract).unwrap();
        let err = ProxyTypeDefinition::synthesize(&catalog, None).unwrap_err();
        assert!(matches!(err, ProxyError::Synthesis { .. }));

        let pure = Contract::pure("ui.Drawable").operation(Operation::new("draw")).build().unwrap();
        let pure_catalog = OperationCatalog::enumerate(&pure).unwrap();
        let skeleton = Arc::new(SkeletonDefinition::synthesize(&pure_catalog).unwrap());
        let err = ProxyTypeDefinition::synthesize(&pure_catalog, Some(skeleton)).unwrap_err();
        assert!(matches!(err, ProxyError::Synthesis { .. }));
    }

    #[test]
    fn test_display_outline() {
        let contract = widget();
        let catalog = OperationCatalog::enumerate(&contract).unwrap();
        let skeleton = Arc::new(SkeletonDefinition::synthesize(&catalog).unwrap());
        let outline = ProxyTypeDefinition::synthesize(&catalog, Some(skeleton))
            .unwrap()
            .to_string();

        assert!(outline.starts_with("proxy Proxy$Widget for concrete ui.Widget {"));
        assert!(outline.contains("forward public abstract draw() -> void"));
        assert!(outline.contains("direct public final id() -> i64"));
        assert!(outline.contains("slot skeleton (4 real, 1 stubs)"));
    }
}
