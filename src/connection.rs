//! A tenant's live connection: one PostgreSQL pool plus the set of models
//! attached to it.

use crate::config::StatementLogger;
use crate::error::TenancyError;
use crate::models::ModelDefinition;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// One tenant's database connection. Owns the attached-model set; destroyed
/// only at process shutdown (no eviction).
pub struct TenantConnection {
    tenant_id: String,
    pool: PgPool,
    attached: RwLock<HashMap<String, Arc<ModelDefinition>>>,
    force_create: bool,
    statement_logger: Option<StatementLogger>,
}

impl TenantConnection {
    pub fn new(tenant_id: impl Into<String>, pool: PgPool, force_create: bool) -> Self {
        TenantConnection {
            tenant_id: tenant_id.into(),
            pool,
            attached: RwLock::new(HashMap::new()),
            force_create,
            statement_logger: None,
        }
    }

    /// Invoke the callback for every statement this connection executes
    /// (currently the attach-time DDL), with its timing.
    pub fn with_statement_logger(mut self, logger: StatementLogger) -> Self {
        self.statement_logger = Some(logger);
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Attach a model to this connection. Idempotent: returns `false` without
    /// side effects when the model is already attached. With `force_create`
    /// the definition's DDL runs against the tenant database; a DDL failure
    /// rolls the attachment back and propagates.
    pub async fn attach(&self, definition: &Arc<ModelDefinition>) -> Result<bool, TenancyError> {
        {
            let mut attached = self.attached.write().expect("attached-model lock poisoned");
            if attached.contains_key(definition.name()) {
                return Ok(false);
            }
            attached.insert(definition.name().to_string(), definition.clone());
        }

        if self.force_create {
            for stmt in definition.ddl() {
                let started = Instant::now();
                if let Err(e) = sqlx::query(stmt).execute(&self.pool).await {
                    self.attached
                        .write()
                        .expect("attached-model lock poisoned")
                        .remove(definition.name());
                    return Err(TenancyError::Db(e));
                }
                if let Some(log) = &self.statement_logger {
                    log(stmt, Some(started.elapsed()));
                }
            }
        }

        tracing::debug!(
            "tenant {}: model {} attached",
            self.tenant_id,
            definition.name()
        );
        Ok(true)
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.attached
            .read()
            .expect("attached-model lock poisoned")
            .contains_key(name)
    }

    /// Keyed lookup: a handle for the named model, bound to this tenant's
    /// pool. `None` when the model is not attached.
    pub fn model(&self, name: &str) -> Option<ModelHandle> {
        let definition = self
            .attached
            .read()
            .expect("attached-model lock poisoned")
            .get(name)
            .cloned()?;
        Some(ModelHandle {
            definition,
            tenant_id: self.tenant_id.clone(),
            pool: self.pool.clone(),
        })
    }

    pub fn attached_models(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .attached
            .read()
            .expect("attached-model lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl std::fmt::Debug for TenantConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConnection")
            .field("tenant_id", &self.tenant_id)
            .field("attached", &self.attached_models())
            .field("force_create", &self.force_create)
            .field("statement_logger", &self.statement_logger.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// A model bound to one tenant's connection, ready for queries.
#[derive(Clone)]
pub struct ModelHandle {
    definition: Arc<ModelDefinition>,
    tenant_id: String,
    pool: PgPool,
}

impl ModelHandle {
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn table(&self) -> String {
        self.definition.table()
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::lazy_pool;

    #[tokio::test]
    async fn attach_is_idempotent() {
        let conn = TenantConnection::new("acme", lazy_pool("acme"), false);
        let def = Arc::new(ModelDefinition::new("Order"));
        assert!(conn.attach(&def).await.unwrap());
        assert!(!conn.attach(&def).await.unwrap());
        assert_eq!(conn.attached_models(), vec!["Order".to_string()]);
    }

    #[tokio::test]
    async fn model_lookup_requires_attachment() {
        let conn = TenantConnection::new("acme", lazy_pool("acme"), false);
        assert!(conn.model("Order").is_none());

        let def = Arc::new(ModelDefinition::new("Order").with_table("orders"));
        conn.attach(&def).await.unwrap();
        let handle = conn.model("Order").expect("attached model");
        assert_eq!(handle.name(), "Order");
        assert_eq!(handle.table(), "orders");
        assert_eq!(handle.tenant_id(), "acme");
    }
}
