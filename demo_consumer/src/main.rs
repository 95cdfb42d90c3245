//! Example consumer: a separate Rust project that uses tenancy-sdk as a
//! dependency, with options resolved asynchronously through a factory
//! (the shape a secrets-manager-backed setup would take).
//!
//! Run from repo root: `cargo run -p demo-consumer`

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use tenancy_sdk::{
    ModelDefinition, TenancyError, TenancyOptions, TenancyOptionsFactory, TenancyState, TenantDb,
};
use tokio::net::TcpListener;

struct EnvOptionsFactory;

#[async_trait]
impl TenancyOptionsFactory for EnvOptionsFactory {
    async fn create_tenancy_options(&self) -> Result<TenancyOptions, TenancyError> {
        Ok(TenancyOptions {
            is_tenant_from_subdomain: true,
            host: std::env::var("PGHOST").ok(),
            username: std::env::var("PGUSER").ok(),
            password: std::env::var("PGPASSWORD").ok(),
            database: Some(std::env::var("PGDATABASE").unwrap_or_else(|_| "app".into())),
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tenancy_sdk=info")),
        )
        .init();

    let state = TenancyState::from_options_factory(&EnvOptionsFactory).await?;
    state
        .register(ModelDefinition::new("Order").with_table("orders"))
        .await?;

    let app = Router::new()
        .route("/whoami", get(whoami))
        .route("/orders/count", get(order_count))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("demo consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    state.shutdown().await;
    Ok(())
}

async fn whoami(TenantDb(conn): TenantDb) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "tenant": conn.tenant_id(),
        "models": conn.attached_models(),
    }))
}

async fn order_count(TenantDb(conn): TenantDb) -> Result<Json<serde_json::Value>, TenancyError> {
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
