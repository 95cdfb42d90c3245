//! Demo server: header-resolved tenants, per-tenant databases via a URI
//! template, two models registered at startup and attached to every tenant
//! connection on first access.

use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tenancy_sdk::{
    Logging, ModelDefinition, TenancyError, TenancyOptions, TenancyState, TenantDb, Whitelist,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tenancy_sdk=info".parse()?))
        .init();

    let base = std::env::var("DATABASE_URL_BASE")
        .unwrap_or_else(|_| "postgres://localhost/app".into());
    let options = TenancyOptions {
        tenant_identifier: Some("X-Tenant-ID".into()),
        whitelist: Some(Whitelist::pattern("^[a-z][a-z0-9_]*$")?),
        force_create_collections: true,
        logging: Logging::Callback(Arc::new(|statement, timing| {
            tracing::info!("executed: {} ({:?})", statement, timing);
        })),
        uri: Some(Arc::new(move |tenant: &str| format!("{}_{}", base, tenant))),
        ..Default::default()
    };
    let state = TenancyState::from_options(options)?;

    state
        .register(
            ModelDefinition::new("Order").with_table("orders").with_ddl(
                "CREATE TABLE IF NOT EXISTS orders (id BIGSERIAL PRIMARY KEY, total NUMERIC NOT NULL)",
            ),
        )
        .await?;
    state
        .register(
            ModelDefinition::new("Invoice").with_table("invoices").with_ddl(
                "CREATE TABLE IF NOT EXISTS invoices (id BIGSERIAL PRIMARY KEY, order_id BIGINT NOT NULL)",
            ),
        )
        .await?;

    let app = Router::new()
        .route("/orders/count", get(count_orders))
        .with_state(state.clone());

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    state.shutdown().await;
    Ok(())
}

async fn count_orders(TenantDb(conn): TenantDb) -> Result<Json<serde_json::Value>, TenancyError> {
    let orders = conn
        .model("Order")
        .ok_or_else(|| TenancyError::Config("model Order not registered".into()))?;
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", orders.table()))
        .fetch_one(orders.pool())
        .await?;
    Ok(Json(serde_json::json!({
        "tenant": conn.tenant_id(),
        "orders": count,
    })))
}
