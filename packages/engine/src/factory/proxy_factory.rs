// packages/engine/src/factory/proxy_factory.rs
//! Proxy factory
//!
//! Runs the construction pipeline for one contract and one handler:
//!
//! 1. enumerate the operation catalog
//! 2. synthesize the skeleton (concrete contracts only)
//! 3. synthesize the proxy type definition
//! 4. build it through the [`TypeLoader`]
//! 5. instantiate, injecting the handler and a fresh skeleton
//!
//! Any failure aborts the request; no partial proxy is returned.

use crate::build::cache::CachingLoader;
use crate::build::loader::{DispatchTableLoader, TypeLoader};
use crate::contract::catalog::OperationCatalog;
use crate::contract::descriptor::{Contract, ContractKind};
use crate::factory::instance::ProxyInstance;
use crate::synthesis::handler::InvocationHandler;
use crate::synthesis::proxy_type::ProxyTypeDefinition;
use crate::synthesis::skeleton::SkeletonDefinition;
use crate::utils::config::ProxyConfig;
use crate::utils::errors::{ProxyError, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Creates proxy instances
pub struct ProxyFactory {
    config: ProxyConfig,
    loader: Arc<dyn TypeLoader>,
}

impl ProxyFactory {
    /// Factory using the in-memory dispatch table loader
    ///
    /// With `cache_types` set, built types are reused per contract.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_loader(config, DispatchTableLoader::new())
    }

    /// Factory using a custom build/load service
    pub fn with_loader<L: TypeLoader + 'static>(config: ProxyConfig, loader: L) -> Self {
        let loader: Arc<dyn TypeLoader> = if config.cache_types {
            Arc::new(CachingLoader::new(loader))
        } else {
            Arc::new(loader)
        };
        Self { config, loader }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build a proxy for `contract` routing calls through `handler`
    pub fn new_proxy_instance(
        &self,
        contract: &Arc<Contract>,
        handler: Arc<dyn InvocationHandler>,
    ) -> Result<ProxyInstance> {
        let start = Instant::now();
        info!("Creating proxy for {} {}", contract.kind(), contract.name());

        let result = self.construct(contract, handler);
        match &result {
            Ok(proxy) => info!(
                "Created {} ({}) in {:?}",
                proxy.type_name(),
                proxy.id(),
                start.elapsed()
            ),
            Err(e) => error!(
                "Failed to create proxy for {} at {} stage: {}",
                contract.name(),
                e.stage(),
                e
            ),
        }
        result
    }

    fn construct(
        &self,
        contract: &Arc<Contract>,
        handler: Arc<dyn InvocationHandler>,
    ) -> Result<ProxyInstance> {
        let catalog = OperationCatalog::enumerate(contract)?;
        debug!("{} exposes {} operations", contract.name(), catalog.len());

        let skeleton = match contract.kind() {
            ContractKind::Concrete => {
                let skeleton = SkeletonDefinition::synthesize(&catalog)?;
                if !skeleton.is_instantiable(&catalog) {
                    return Err(ProxyError::Skeleton {
                        contract: contract.name().to_string(),
                        reason: "catalog operations left without implementation".to_string(),
                    });
                }
                Some(Arc::new(skeleton))
            }
            ContractKind::Pure => None,
        };

        let definition = ProxyTypeDefinition::synthesize(&catalog, skeleton)?;

        let built = self
            .loader
            .build(definition)
            .map_err(|failure| ProxyError::Build {
                contract: contract.name().to_string(),
                failure,
            })?;

        // Fresh skeleton of the built type, which may come from the cache
        let skeleton = built.skeleton_definition().map(|definition| definition.instantiate());
        built.instantiate(handler, skeleton, &self.config)
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new(ProxyConfig::default())
    }
}

/// Build a proxy with the default factory
pub fn new_proxy_instance(
    contract: &Arc<Contract>,
    handler: Arc<dyn InvocationHandler>,
) -> Result<ProxyInstance> {
    ProxyFactory::default().new_proxy_instance(contract, handler)
}
