//! Connection factory: builds a tenant-scoped pool from the base options plus
//! a tenant id. Pure construction; owns no shared state.

use crate::config::{Logging, TenancyOptions};
use crate::connection::TenantConnection;
use crate::error::TenancyError;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::ConnectOptions;
use sqlx::Executor;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Seam for connection construction. The registry only sees this trait, so
/// tests can count and delay builds without a live database.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn build(&self, tenant_id: &str) -> Result<TenantConnection, TenancyError>;
}

/// PostgreSQL factory: merges the tenant id into the base options via the
/// `uri` template when set, otherwise by `{database}_{tenant}` naming on the
/// discrete fields. No retry policy; retries are the caller's concern.
pub struct PgConnectionFactory {
    options: Arc<TenancyOptions>,
}

impl PgConnectionFactory {
    pub fn new(options: Arc<TenancyOptions>) -> Self {
        PgConnectionFactory { options }
    }

    fn connect_options(&self, tenant_id: &str) -> Result<PgConnectOptions, TenancyError> {
        let opts = if let Some(uri) = &self.options.uri {
            let url = uri(tenant_id);
            PgConnectOptions::from_str(&url).map_err(|e| {
                TenancyError::Config(format!("invalid tenant uri '{}': {}", url, e))
            })?
        } else {
            let database = match &self.options.database {
                Some(db) => format!("{}_{}", db, tenant_id),
                None => tenant_id.to_string(),
            };
            let mut o = PgConnectOptions::new()
                .host(self.options.host.as_deref().unwrap_or("localhost"))
                .database(&database)
                .ssl_mode(if self.options.ssl {
                    PgSslMode::Require
                } else {
                    PgSslMode::Prefer
                });
            if let Some(port) = self.options.port {
                o = o.port(port);
            }
            if let Some(username) = &self.options.username {
                o = o.username(username);
            }
            if let Some(password) = &self.options.password {
                o = o.password(password);
            }
            o
        };

        Ok(match &self.options.logging {
            Logging::On => opts.log_statements(log::LevelFilter::Info),
            Logging::Off | Logging::Callback(_) => opts.disable_statement_logging(),
        })
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn build(&self, tenant_id: &str) -> Result<TenantConnection, TenancyError> {
        let connect = self.connect_options(tenant_id)?;
        let timeout = Duration::from_secs(self.options.connect_timeout_secs);
        let tz_sql = Arc::new(set_timezone_sql(&self.options.timezone));

        let pool_options = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .after_connect(move |conn, _meta| {
                let sql = tz_sql.clone();
                Box::pin(async move {
                    conn.execute(sql.as_str()).await?;
                    Ok(())
                })
            });

        let pool = match tokio::time::timeout(timeout, pool_options.connect_with(connect)).await {
            Ok(Ok(pool)) => pool,
            Ok(Err(e)) => {
                return Err(TenancyError::Connection {
                    tenant_id: tenant_id.to_string(),
                    source: e,
                })
            }
            Err(_) => {
                return Err(TenancyError::Connection {
                    tenant_id: tenant_id.to_string(),
                    source: sqlx::Error::PoolTimedOut,
                })
            }
        };

        tracing::info!("tenant {}: connection opened", tenant_id);
        let mut conn = TenantConnection::new(
            tenant_id,
            pool,
            self.options.force_create_collections,
        );
        if let Logging::Callback(logger) = &self.options.logging {
            conn = conn.with_statement_logger(logger.clone());
        }
        Ok(conn)
    }
}

/// `SET TIME ZONE` for session setup. Offsets need the INTERVAL form.
fn set_timezone_sql(timezone: &str) -> String {
    if timezone.starts_with('+') || timezone.starts_with('-') {
        format!("SET TIME ZONE INTERVAL '{}' HOUR TO MINUTE", timezone)
    } else {
        format!("SET TIME ZONE '{}'", timezone.replace('\'', "''"))
    }
}
