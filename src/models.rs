//! Model definitions and the process-wide definition map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A named data-model definition shared across all tenants. Registered once,
/// read-only thereafter. The DDL statements are executed on a tenant
/// connection at attach time when `force_create_collections` is set; they
/// must be idempotent (`CREATE ... IF NOT EXISTS`).
#[derive(Clone, Debug)]
pub struct ModelDefinition {
    name: String,
    table: Option<String>,
    ddl: Vec<String>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ModelDefinition {
            name: name.into(),
            table: None,
            ddl: Vec::new(),
        }
    }

    /// Table backing this model. Defaults to the lowercased model name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_ddl(mut self, statement: impl Into<String>) -> Self {
        self.ddl.push(statement.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> String {
        self.table.clone().unwrap_or_else(|| self.name.to_lowercase())
    }

    pub fn ddl(&self) -> &[String] {
        &self.ddl
    }
}

/// Process-wide registry of model definitions, keyed by model name.
/// A name maps to at most one definition; re-registration is a no-op
/// (first registration wins), never an overwrite.
#[derive(Default)]
pub struct ModelDefinitionMap {
    inner: RwLock<HashMap<String, Arc<ModelDefinition>>>,
}

impl ModelDefinitionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.read().expect("definition map lock poisoned").contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelDefinition>> {
        self.inner.read().expect("definition map lock poisoned").get(name).cloned()
    }

    /// Insert a definition unless the name is already present. Returns the
    /// stored definition when inserted, `None` on the duplicate no-op.
    pub fn set(&self, definition: ModelDefinition) -> Option<Arc<ModelDefinition>> {
        let mut map = self.inner.write().expect("definition map lock poisoned");
        if map.contains_key(definition.name()) {
            return None;
        }
        let def = Arc::new(definition);
        map.insert(def.name().to_string(), def.clone());
        Some(def)
    }

    /// Roll back a failed registration. Not part of the public contract:
    /// definitions are never deleted once registered successfully.
    pub(crate) fn remove(&self, name: &str) {
        self.inner
            .write()
            .expect("definition map lock poisoned")
            .remove(name);
    }

    /// Snapshot of all definitions at call time; safe to iterate while the
    /// map keeps mutating.
    pub fn all(&self) -> Vec<Arc<ModelDefinition>> {
        self.inner
            .read()
            .expect("definition map lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("definition map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
