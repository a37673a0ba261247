// packages/engine/src/utils/errors.rs
//! Error types for proxy construction and invocation
//!
//! Construction failures ([`ProxyError`]) are fatal to a factory call and
//! always name the contract and the stage that failed. Invocation failures
//! ([`InvocationError`]) belong to a single operation call on a built proxy.

use crate::build::loader::BuildFailure;
use crate::contract::types::TypeRef;
use std::fmt;
use thiserror::Error;

/// Construction stage that produced a [`ProxyError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Contract,
    Catalog,
    Skeleton,
    Synthesis,
    Build,
    Binding,
    Config,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Contract => "contract",
            Stage::Catalog => "catalog",
            Stage::Skeleton => "skeleton",
            Stage::Synthesis => "synthesis",
            Stage::Build => "build",
            Stage::Binding => "binding",
            Stage::Config => "config",
        };
        f.write_str(name)
    }
}

/// Proxy construction errors
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("invalid contract: {0}")]
    Contract(#[from] ContractError),

    #[error("cannot enumerate operations of {contract}: {reason}")]
    Catalog { contract: String, reason: String },

    #[error("skeleton for {contract} is not instantiable: {reason}")]
    Skeleton { contract: String, reason: String },

    #[error("cannot synthesize proxy type for {contract}: {reason}")]
    Synthesis { contract: String, reason: String },

    #[error("build of proxy type for {contract} failed: {failure}")]
    Build {
        contract: String,
        failure: BuildFailure,
    },

    /// Built type and supplied instances disagree; always an internal bug
    #[error("internal error binding {slot} slot of proxy for {contract}")]
    Binding { contract: String, slot: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// Stage of the construction pipeline that failed
    pub fn stage(&self) -> Stage {
        match self {
            ProxyError::Contract(_) => Stage::Contract,
            ProxyError::Catalog { .. } => Stage::Catalog,
            ProxyError::Skeleton { .. } => Stage::Skeleton,
            ProxyError::Synthesis { .. } => Stage::Synthesis,
            ProxyError::Build { .. } => Stage::Build,
            ProxyError::Binding { .. } => Stage::Binding,
            ProxyError::Config(_) => Stage::Config,
        }
    }

    /// Qualified name of the contract the failed request was for
    pub fn contract(&self) -> Option<&str> {
        match self {
            ProxyError::Contract(e) => Some(e.contract()),
            ProxyError::Catalog { contract, .. }
            | ProxyError::Skeleton { contract, .. }
            | ProxyError::Synthesis { contract, .. }
            | ProxyError::Build { contract, .. }
            | ProxyError::Binding { contract, .. } => Some(contract),
            ProxyError::Config(_) => None,
        }
    }
}

impl From<config::ConfigError> for ProxyError {
    fn from(err: config::ConfigError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

/// Contract descriptor validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("contract name must not be empty")]
    InvalidName { contract: String },

    #[error("{contract} declares {signature} more than once")]
    DuplicateOperation { contract: String, signature: String },

    #[error("{contract}.{signature}: {reason}")]
    InvalidModifiers {
        contract: String,
        signature: String,
        reason: String,
    },

    #[error("{contract}.{signature} is not abstract but has no body")]
    MissingBody { contract: String, signature: String },

    #[error("{contract} cannot use {supertype} as a supertype: {reason}")]
    InvalidSupertype {
        contract: String,
        supertype: String,
        reason: String,
    },
}

impl ContractError {
    pub fn contract(&self) -> &str {
        match self {
            ContractError::InvalidName { contract }
            | ContractError::DuplicateOperation { contract, .. }
            | ContractError::InvalidModifiers { contract, .. }
            | ContractError::MissingBody { contract, .. }
            | ContractError::InvalidSupertype { contract, .. } => contract,
        }
    }
}

/// A value could not be converted to a declared type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct ConversionError {
    pub expected: TypeRef,
    pub found: String,
}

/// Errors raised by a single operation call on a proxy instance
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("{contract} has no operation {operation}")]
    UnknownOperation { contract: String, operation: String },

    #[error("call to {operation} matches {candidates} overloads")]
    Ambiguous { operation: String, candidates: usize },

    #[error("{operation} is not accessible from this scope")]
    NotAccessible { operation: String },

    #[error("bad arguments for {operation}: {reason}")]
    Arguments { operation: String, reason: String },

    #[error("handler failed on {operation}")]
    Handler {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Handler failed while serving an operation that has no body anywhere
    #[error("operation {operation} is not implemented")]
    NotImplemented {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("handler result for {operation} does not match its return type")]
    ReturnType {
        operation: String,
        #[source]
        source: ConversionError,
    },

    #[error("direct call to {operation} failed")]
    Body {
        operation: String,
        #[source]
        source: anyhow::Error,
    },
}

impl InvocationError {
    /// Whether the error came out of the forwarding path (handler or result conversion)
    pub fn is_forwarding_failure(&self) -> bool {
        matches!(
            self,
            InvocationError::Handler { .. }
                | InvocationError::NotImplemented { .. }
                | InvocationError::ReturnType { .. }
        )
    }
}

/// Result type for proxy construction
pub type Result<T> = std::result::Result<T, ProxyError>;
