// packages/engine/src/build/loader.rs
//! Build/load service
//!
//! Turns a [`ProxyTypeDefinition`] into an instantiable [`BuiltType`]. The
//! default [`DispatchTableLoader`] builds entirely in memory: each operation
//! becomes a closure in a table keyed by signature. Nothing is emitted or
//! compiled.

use crate::contract::descriptor::{Contract, ContractKind};
use crate::contract::operation::{Operation, Signature};
use crate::contract::types::Value;
use crate::factory::instance::{ProxyInstance, ProxySlots};
use crate::synthesis::handler::InvocationHandler;
use crate::synthesis::proxy_type::ProxyTypeDefinition;
use crate::synthesis::skeleton::{Skeleton, SkeletonDefinition};
use crate::utils::config::ProxyConfig;
use crate::utils::errors::{InvocationError, ProxyError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One finding produced while building a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Operation the finding is about, if any
    pub operation: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            operation: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            operation: None,
        }
    }

    pub fn at(mut self, signature: &Signature) -> Self {
        self.operation = Some(signature.to_string());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.operation {
            Some(op) => write!(f, "{}: {}: {}", level, op, self.message),
            None => write!(f, "{}: {}", level, self.message),
        }
    }
}

/// Structured build failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildFailure {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors: Vec<String> = self.errors().map(ToString::to_string).collect();
        if errors.is_empty() {
            f.write_str("build failed")
        } else {
            f.write_str(&errors.join("; "))
        }
    }
}

impl std::error::Error for BuildFailure {}

/// Service turning type definitions into instantiable types
///
/// Builds are synchronous and may be slow; callers do not retry failures.
pub trait TypeLoader: Send + Sync {
    fn build(
        &self,
        definition: ProxyTypeDefinition,
    ) -> std::result::Result<Arc<BuiltType>, BuildFailure>;
}

impl<T: TypeLoader + ?Sized> TypeLoader for Arc<T> {
    fn build(
        &self,
        definition: ProxyTypeDefinition,
    ) -> std::result::Result<Arc<BuiltType>, BuildFailure> {
        (**self).build(definition)
    }
}

/// Compiled call path for one operation
pub type Dispatch =
    Arc<dyn Fn(&ProxySlots, &[Value]) -> std::result::Result<Value, InvocationError> + Send + Sync>;

/// Dispatch table row
#[derive(Clone)]
pub struct DispatchEntry {
    operation: Arc<Operation>,
    forwarded: bool,
    call: Dispatch,
}

impl DispatchEntry {
    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    /// Whether calls go through the handler
    pub fn is_forwarded(&self) -> bool {
        self.forwarded
    }

    pub fn call(
        &self,
        slots: &ProxySlots,
        args: &[Value],
    ) -> std::result::Result<Value, InvocationError> {
        (self.call)(slots, args)
    }
}

impl fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("operation", &self.operation.signature().to_string())
            .field("forwarded", &self.forwarded)
            .finish()
    }
}

/// Slots a built type expects to be filled at instantiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub handler: bool,
    pub skeleton: bool,
}

/// Instantiable proxy type
pub struct BuiltType {
    type_name: String,
    contract: Arc<Contract>,
    table: HashMap<Signature, DispatchEntry>,
    layout: SlotLayout,
    skeleton: Option<Arc<SkeletonDefinition>>,
}

impl BuiltType {
    /// Assemble a built type from an already validated table
    pub fn new(
        type_name: impl Into<String>,
        contract: Arc<Contract>,
        table: HashMap<Signature, DispatchEntry>,
        layout: SlotLayout,
        skeleton: Option<Arc<SkeletonDefinition>>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            contract,
            table,
            layout,
            skeleton,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    pub fn skeleton_definition(&self) -> Option<&Arc<SkeletonDefinition>> {
        self.skeleton.as_ref()
    }

    pub fn entry(&self, signature: &Signature) -> Option<&DispatchEntry> {
        self.table.get(signature)
    }

    pub fn entries(&self) -> impl Iterator<Item = &DispatchEntry> {
        self.table.values()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Create an instance, injecting the handler and skeleton
    pub fn instantiate(
        self: &Arc<Self>,
        handler: Arc<dyn InvocationHandler>,
        skeleton: Option<Skeleton>,
        config: &ProxyConfig,
    ) -> Result<ProxyInstance> {
        let binding = |slot: &str| ProxyError::Binding {
            contract: self.contract.name().to_string(),
            slot: slot.to_string(),
        };

        if !self.layout.handler {
            return Err(binding("handler"));
        }

        match (&self.skeleton, &skeleton) {
            (None, None) => {}
            (Some(expected), Some(given)) if Arc::ptr_eq(expected, given.definition()) => {}
            _ => return Err(binding("skeleton")),
        }
        if self.layout.skeleton != skeleton.is_some() {
            return Err(binding("skeleton"));
        }

        let slots = ProxySlots::new(
            handler,
            skeleton,
            config.failure_policy,
            config.failure_log_capacity,
        );
        Ok(ProxyInstance::new(Arc::clone(self), slots))
    }
}

impl fmt::Debug for BuiltType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltType")
            .field("type_name", &self.type_name)
            .field("contract", &self.contract.name())
            .field("entries", &self.table.len())
            .field("layout", &self.layout)
            .finish()
    }
}

/// In-memory loader producing a dispatch table of closures
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchTableLoader;

impl DispatchTableLoader {
    pub fn new() -> Self {
        Self
    }

    /// Check a definition for consistency
    pub fn validate(&self, definition: &ProxyTypeDefinition) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut seen = HashMap::new();

        if definition.type_name().trim().is_empty() {
            diagnostics.push(Diagnostic::error("type name is empty"));
        }

        match (definition.kind(), definition.skeleton()) {
            (ContractKind::Concrete, None) => {
                diagnostics.push(Diagnostic::error("concrete contract without skeleton"));
            }
            (ContractKind::Pure, Some(_)) => {
                diagnostics.push(Diagnostic::error("pure contract with skeleton"));
            }
            _ => {}
        }

        let operations = definition
            .forwarding()
            .iter()
            .map(|e| (e.operation(), true))
            .chain(definition.direct().iter().map(|e| (e.operation(), false)));

        for (op, forwarded) in operations {
            let signature = op.signature();
            if seen.insert(signature.clone(), forwarded).is_some() {
                diagnostics.push(Diagnostic::error("operation defined twice").at(signature));
            }
            if forwarded && !op.is_interceptable() {
                diagnostics.push(
                    Diagnostic::error("final, static and native operations cannot be forwarded")
                        .at(signature),
                );
            }
            if !forwarded && op.is_interceptable() {
                diagnostics.push(
                    Diagnostic::warning("interceptable operation bound directly").at(signature),
                );
            }
            if let Some(skeleton) = definition.skeleton() {
                if skeleton.slot(signature).is_none() {
                    diagnostics.push(
                        Diagnostic::error("skeleton has no implementation, not instantiable")
                            .at(signature),
                    );
                }
            }
        }

        if seen.is_empty() {
            diagnostics.push(Diagnostic::warning("contract exposes no operations"));
        }

        diagnostics
    }
}

impl TypeLoader for DispatchTableLoader {
    fn build(
        &self,
        definition: ProxyTypeDefinition,
    ) -> std::result::Result<Arc<BuiltType>, BuildFailure> {
        let diagnostics = self.validate(&definition);
        for warning in diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
            warn!("{}: {}", definition.type_name(), warning);
        }
        if diagnostics.iter().any(|d| d.severity == Severity::Error) {
            error!(
                "Rejected definition of {} with {} diagnostics",
                definition.type_name(),
                diagnostics.len()
            );
            metrics::counter!("proxy_build_failures_total").increment(1);
            return Err(BuildFailure::new(diagnostics));
        }

        debug!("Building dispatch table:\n{}", definition);

        let mut table = HashMap::new();
        for entry in definition.forwarding() {
            let forwarding = entry.clone();
            let call: Dispatch = Arc::new(move |slots: &ProxySlots, args: &[Value]| {
                forwarding.forward(slots, args)
            });
            table.insert(
                entry.operation().signature().clone(),
                DispatchEntry {
                    operation: Arc::clone(entry.operation()),
                    forwarded: true,
                    call,
                },
            );
        }
        for entry in definition.direct() {
            let direct = entry.clone();
            let call: Dispatch =
                Arc::new(move |slots: &ProxySlots, args: &[Value]| direct.call(slots, args));
            table.insert(
                entry.operation().signature().clone(),
                DispatchEntry {
                    operation: Arc::clone(entry.operation()),
                    forwarded: false,
                    call,
                },
            );
        }

        let layout = SlotLayout {
            handler: true,
            skeleton: definition.skeleton().is_some(),
        };

        metrics::counter!("proxy_builds_total").increment(1);
        info!(
            "Built {} for {} ({} operations)",
            definition.type_name(),
            definition.contract().name(),
            table.len()
        );

        Ok(Arc::new(BuiltType::new(
            definition.type_name(),
            Arc::clone(definition.contract()),
            table,
            layout,
            definition.skeleton().cloned(),
        )))
    }
}
