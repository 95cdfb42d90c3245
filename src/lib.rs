//! Tenancy SDK: multi-tenant connection and model registry for PostgreSQL.
//!
//! Each tenant gets its own lazily created, cached connection pool; models
//! registered once are attached to every tenant connection, past and future,
//! exactly once.

pub mod config;
pub mod connection;
pub mod error;
pub mod extractors;
pub mod factory;
pub mod models;
pub mod propagator;
pub mod registry;
pub mod resolver;
pub mod state;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use config::{
    resolve_options, resolve_options_with, validate_options, Logging, StatementLogger,
    TenancyOptions, TenancyOptionsFactory, UriTemplate, ValidatorFactory, Whitelist,
    WhitelistPattern,
};
pub use connection::{ModelHandle, TenantConnection};
pub use error::TenancyError;
pub use extractors::{TenantDb, TenantId};
pub use factory::{ConnectionFactory, PgConnectionFactory};
pub use models::{ModelDefinition, ModelDefinitionMap};
pub use propagator::ModelPropagator;
pub use registry::ConnectionRegistry;
pub use resolver::resolve_tenant_id;
pub use state::TenancyState;
pub use validator::TenancyValidator;
