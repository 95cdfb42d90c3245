//! Connection registry: one lazily created, cached connection per tenant.

use crate::config::ValidatorFactory;
use crate::connection::TenantConnection;
use crate::error::TenancyError;
use crate::factory::ConnectionFactory;
use crate::models::ModelDefinitionMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Process-wide tenant id → connection cache. Creation is single-flight per
/// tenant id under a per-tenant lock, so unrelated tenants never serialize on
/// each other. Connections live until `shutdown`.
pub struct ConnectionRegistry {
    factory: Arc<dyn ConnectionFactory>,
    definitions: Arc<ModelDefinitionMap>,
    validator: Option<ValidatorFactory>,
    connections: RwLock<HashMap<String, Arc<TenantConnection>>>,
    creation_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConnectionRegistry {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        definitions: Arc<ModelDefinitionMap>,
        validator: Option<ValidatorFactory>,
    ) -> Self {
        ConnectionRegistry {
            factory,
            definitions,
            validator,
            connections: RwLock::new(HashMap::new()),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return the tenant's connection, creating it on first access. Every
    /// model registered before the connection becomes visible is attached to
    /// it. Factory failures are propagated without publishing anything, so a
    /// later call retries creation.
    pub async fn get_or_create(
        &self,
        tenant_id: &str,
    ) -> Result<Arc<TenantConnection>, TenancyError> {
        if let Some(make) = &self.validator {
            let validator = make(tenant_id).set_tenant_id(tenant_id);
            validator.validate().await?;
        }

        if let Some(conn) = self.get(tenant_id) {
            return Ok(conn);
        }

        let lock = self.creation_lock(tenant_id);
        let _guard = lock.lock().await;

        // Another caller may have finished creating while we waited.
        if let Some(conn) = self.get(tenant_id) {
            return Ok(conn);
        }

        tracing::debug!("tenant {}: creating connection", tenant_id);
        let conn = self.factory.build(tenant_id).await?;
        for def in self.definitions.all() {
            conn.attach(&def).await?;
        }
        let conn = Arc::new(conn);
        self.connections
            .write()
            .expect("connection map lock poisoned")
            .insert(tenant_id.to_string(), conn.clone());

        // A registration running while we were building wrote its definition
        // before iterating live connections, and this connection was not
        // visible yet. Re-check the map now that it is published; attach is
        // idempotent, so overlap with the propagator is harmless. On an
        // attach failure the connection is unpublished again: a cached
        // connection missing a registered model would never be repaired,
        // while an unpublished one is rebuilt on the next call.
        for def in self.definitions.all() {
            if let Err(e) = conn.attach(&def).await {
                self.connections
                    .write()
                    .expect("connection map lock poisoned")
                    .remove(tenant_id);
                return Err(e);
            }
        }

        Ok(conn)
    }

    pub fn get(&self, tenant_id: &str) -> Option<Arc<TenantConnection>> {
        self.connections
            .read()
            .expect("connection map lock poisoned")
            .get(tenant_id)
            .cloned()
    }

    /// Snapshot of all live connections at call time.
    pub fn snapshot(&self) -> Vec<Arc<TenantConnection>> {
        self.connections
            .read()
            .expect("connection map lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .expect("connection map lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the map and close every pool. Called once at process shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, Arc<TenantConnection>)> = self
            .connections
            .write()
            .expect("connection map lock poisoned")
            .drain()
            .collect();
        for (tenant_id, conn) in drained {
            conn.close().await;
            tracing::info!("tenant {}: connection closed", tenant_id);
        }
    }

    fn creation_lock(&self, tenant_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .creation_locks
            .lock()
            .expect("creation lock map poisoned");
        locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubFactory;
    use crate::validator::TenancyValidator;
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    fn registry_with(factory: Arc<StubFactory>) -> Arc<ConnectionRegistry> {
        Arc::new(ConnectionRegistry::new(
            factory,
            Arc::new(ModelDefinitionMap::new()),
            None,
        ))
    }

    #[tokio::test]
    async fn concurrent_first_callers_share_one_connection() {
        let factory = Arc::new(StubFactory::with_delay(Duration::from_millis(50)));
        let registry = registry_with(factory.clone());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let registry = registry.clone();
            tasks.spawn(async move { registry.get_or_create("acme").await });
        }
        let mut conns = Vec::new();
        while let Some(res) = tasks.join_next().await {
            conns.push(res.unwrap().unwrap());
        }

        assert_eq!(factory.build_count(), 1);
        assert_eq!(registry.len(), 1);
        for conn in &conns[1..] {
            assert!(Arc::ptr_eq(&conns[0], conn));
        }
    }

    #[tokio::test]
    async fn distinct_tenants_create_in_parallel() {
        let factory = Arc::new(StubFactory::with_delay(Duration::from_millis(200)));
        let registry = registry_with(factory.clone());

        let start = Instant::now();
        let (a, b) = tokio::join!(registry.get_or_create("t1"), registry.get_or_create("t2"));
        a.unwrap();
        b.unwrap();

        // Both creations sleep 200ms; serialized they would take 400ms+.
        assert!(start.elapsed() < Duration::from_millis(350));
        assert_eq!(factory.build_count(), 2);
    }

    #[tokio::test]
    async fn repeated_calls_reuse_the_cached_connection() {
        let factory = Arc::new(StubFactory::new());
        let registry = registry_with(factory.clone());

        let first = registry.get_or_create("acme").await.unwrap();
        let second = registry.get_or_create("acme").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.build_count(), 1);
    }

    #[tokio::test]
    async fn factory_failure_does_not_poison_the_registry() {
        let factory = Arc::new(StubFactory::failing_times(1));
        let registry = registry_with(factory.clone());

        let err = registry.get_or_create("acme").await.unwrap_err();
        assert!(matches!(err, TenancyError::Connection { .. }));
        assert!(registry.is_empty());

        let conn = registry.get_or_create("acme").await.unwrap();
        assert_eq!(conn.tenant_id(), "acme");
        assert_eq!(registry.len(), 1);
    }

    struct Rejecting {
        tenant_id: String,
    }

    #[async_trait]
    impl TenancyValidator for Rejecting {
        fn set_tenant_id(mut self: Box<Self>, tenant_id: &str) -> Box<dyn TenancyValidator> {
            self.tenant_id = tenant_id.to_string();
            self
        }

        async fn validate(&self) -> Result<(), TenancyError> {
            Err(TenancyError::Validation(format!(
                "tenant '{}' is not provisioned",
                self.tenant_id
            )))
        }
    }

    #[tokio::test]
    async fn failing_validator_prevents_creation_and_reuse() {
        let factory = Arc::new(StubFactory::new());
        let make_validator: ValidatorFactory = Arc::new(|_: &str| {
            Box::new(Rejecting {
                tenant_id: String::new(),
            }) as Box<dyn TenancyValidator>
        });
        let registry = Arc::new(ConnectionRegistry::new(
            factory.clone(),
            Arc::new(ModelDefinitionMap::new()),
            Some(make_validator),
        ));

        for _ in 0..2 {
            let err = registry.get_or_create("acme").await.unwrap_err();
            assert!(matches!(err, TenancyError::Validation(_)));
        }
        assert!(registry.is_empty());
        assert_eq!(factory.build_count(), 0);
    }

    #[tokio::test]
    async fn ddl_failure_during_creation_publishes_nothing() {
        use crate::models::ModelDefinition;

        let definitions = Arc::new(ModelDefinitionMap::new());
        definitions.set(
            ModelDefinition::new("Order")
                .with_ddl("CREATE TABLE IF NOT EXISTS orders (id BIGINT)"),
        );
        let registry = ConnectionRegistry::new(
            Arc::new(StubFactory::force_create_unreachable()),
            definitions,
            None,
        );

        let err = registry.get_or_create("acme").await.unwrap_err();
        assert!(matches!(err, TenancyError::Db(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn creation_attaches_preregistered_models() {
        use crate::models::ModelDefinition;

        let definitions = Arc::new(ModelDefinitionMap::new());
        definitions.set(ModelDefinition::new("Order"));
        let registry =
            ConnectionRegistry::new(Arc::new(StubFactory::new()), definitions, None);

        let conn = registry.get_or_create("acme").await.unwrap();
        assert!(conn.has_model("Order"));
    }
}
