//! Model propagation: every registered model reaches every connection,
//! past and future, exactly once.

use crate::error::TenancyError;
use crate::models::{ModelDefinition, ModelDefinitionMap};
use crate::registry::ConnectionRegistry;
use std::sync::Arc;

/// Registers model definitions and pushes them onto all live connections.
/// Future connections pick them up from the definition map at creation time.
pub struct ModelPropagator {
    definitions: Arc<ModelDefinitionMap>,
    registry: Arc<ConnectionRegistry>,
}

impl ModelPropagator {
    pub fn new(definitions: Arc<ModelDefinitionMap>, registry: Arc<ConnectionRegistry>) -> Self {
        ModelPropagator {
            definitions,
            registry,
        }
    }

    /// Register a model. Duplicate names are a silent no-op (first
    /// registration wins); otherwise the definition is written to the map
    /// first, then attached to a snapshot of all live connections. The
    /// map-write-first ordering pairs with the registry's post-publish
    /// re-check, so a connection created concurrently picks the model up on
    /// at least one of the two paths.
    ///
    /// An attach failure rolls the definition back out of the map before the
    /// error propagates: a half-propagated model must not look registered, or
    /// the duplicate no-op would make the gap permanent. A retried `register`
    /// re-attaches everywhere; connections that got the model before the
    /// failure skip it idempotently.
    pub async fn register(&self, definition: ModelDefinition) -> Result<(), TenancyError> {
        let name = definition.name().to_string();
        let def = match self.definitions.set(definition) {
            Some(def) => def,
            None => {
                tracing::debug!("model {}: already registered, skipping", name);
                return Ok(());
            }
        };

        let connections = self.registry.snapshot();
        tracing::debug!(
            "model {}: propagating to {} live connection(s)",
            name,
            connections.len()
        );
        for conn in connections {
            if let Err(e) = conn.attach(&def).await {
                tracing::warn!(
                    "model {}: propagation to tenant {} failed, rolling back registration",
                    name,
                    conn.tenant_id()
                );
                self.definitions.remove(&name);
                return Err(e);
            }
        }
        Ok(())
    }
}
