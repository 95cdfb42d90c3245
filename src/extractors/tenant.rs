//! Extract the tenant from a request: the resolved id, or the full
//! tenant-scoped connection.

use crate::connection::TenantConnection;
use crate::error::TenancyError;
use crate::resolver::resolve_tenant_id;
use crate::state::TenancyState;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::HOST, request::Parts},
};
use std::sync::Arc;

/// Resolved tenant id, per the configured source (static, header, or
/// subdomain). Rejects with a resolution error when none applies.
#[derive(Clone, Debug)]
pub struct TenantId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for TenantId
where
    TenancyState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = TenancyError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tenancy = TenancyState::from_ref(state);
        let options = tenancy.options();
        let header_value = options
            .tenant_identifier
            .as_deref()
            .and_then(|key| parts.headers.get(key))
            .and_then(|v| v.to_str().ok());
        let host = parts.headers.get(HOST).and_then(|v| v.to_str().ok());
        let tenant_id = resolve_tenant_id(options, header_value, host)?;
        Ok(TenantId(tenant_id))
    }
}

/// The tenant's connection, resolved, validated, and created on first access.
/// This is the whole per-request control flow in one extractor.
#[derive(Clone)]
pub struct TenantDb(pub Arc<TenantConnection>);

#[async_trait]
impl<S> FromRequestParts<S> for TenantDb
where
    TenancyState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = TenancyError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TenantId(tenant_id) = TenantId::from_request_parts(parts, state).await?;
        let tenancy = TenancyState::from_ref(state);
        let conn = tenancy.tenant_connection(&tenant_id).await?;
        Ok(TenantDb(conn))
    }
}
