//! Process-wide tenancy state: options, definition map, registry, and
//! propagator, constructed once at startup and cloned into handlers.

use crate::config::{
    resolve_options, resolve_options_with, TenancyOptions, TenancyOptionsFactory,
};
use crate::connection::TenantConnection;
use crate::error::TenancyError;
use crate::factory::{ConnectionFactory, PgConnectionFactory};
use crate::models::{ModelDefinition, ModelDefinitionMap};
use crate::propagator::ModelPropagator;
use crate::registry::ConnectionRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct TenancyState {
    options: Arc<TenancyOptions>,
    definitions: Arc<ModelDefinitionMap>,
    registry: Arc<ConnectionRegistry>,
    propagator: Arc<ModelPropagator>,
}

impl TenancyState {
    /// Synchronous setup: validate the options and assemble the registry
    /// around a PostgreSQL factory. Both maps start empty.
    pub fn from_options(options: TenancyOptions) -> Result<Self, TenancyError> {
        let options = resolve_options(options)?;
        let factory = Arc::new(PgConnectionFactory::new(options.clone()));
        Ok(Self::assemble(options, factory))
    }

    /// Asynchronous setup: resolve options through a factory exactly once,
    /// then assemble as in `from_options`.
    pub async fn from_options_factory(
        factory: &dyn TenancyOptionsFactory,
    ) -> Result<Self, TenancyError> {
        let options = resolve_options_with(factory).await?;
        let pg = Arc::new(PgConnectionFactory::new(options.clone()));
        Ok(Self::assemble(options, pg))
    }

    /// Assemble around a custom connection factory. `options` must already be
    /// resolved.
    pub fn with_factory(
        options: Arc<TenancyOptions>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Self {
        Self::assemble(options, factory)
    }

    fn assemble(options: Arc<TenancyOptions>, factory: Arc<dyn ConnectionFactory>) -> Self {
        let definitions = Arc::new(ModelDefinitionMap::new());
        let registry = Arc::new(ConnectionRegistry::new(
            factory,
            definitions.clone(),
            options.validator.clone(),
        ));
        let propagator = Arc::new(ModelPropagator::new(definitions.clone(), registry.clone()));
        TenancyState {
            options,
            definitions,
            registry,
            propagator,
        }
    }

    pub fn options(&self) -> &TenancyOptions {
        &self.options
    }

    pub fn definitions(&self) -> &ModelDefinitionMap {
        &self.definitions
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register a model; it is attached to every live connection and to every
    /// connection created later.
    pub async fn register(&self, definition: ModelDefinition) -> Result<(), TenancyError> {
        self.propagator.register(definition).await
    }

    /// The tenant's connection, created on first access.
    pub async fn tenant_connection(
        &self,
        tenant_id: &str,
    ) -> Result<Arc<TenantConnection>, TenancyError> {
        self.registry.get_or_create(tenant_id).await
    }

    /// Close every tenant connection. Call once at process exit.
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}
