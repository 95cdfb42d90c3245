//! Pluggable tenant validation. The registry invokes the configured validator
//! before serving a connection; a rejection surfaces as
//! `TenancyError::Validation` and prevents creation and reuse alike.

use crate::error::TenancyError;
use async_trait::async_trait;

/// Implemented by the application to vet a resolved tenant id (existence
/// check against a central table, subscription state, ...). The registry
/// calls `set_tenant_id` with the resolved id, then `validate`.
#[async_trait]
pub trait TenancyValidator: Send + Sync {
    /// Record the tenant id under validation. Returns self for chaining.
    fn set_tenant_id(self: Box<Self>, tenant_id: &str) -> Box<dyn TenancyValidator>;

    async fn validate(&self) -> Result<(), TenancyError>;
}
