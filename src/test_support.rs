//! Shared test helpers: lazily-connecting pools and a stub connection factory.
//! Pools from `connect_lazy_with` never touch the network unless queried, so
//! registry behavior is testable without a live PostgreSQL.

use crate::connection::TenantConnection;
use crate::error::TenancyError;
use crate::factory::ConnectionFactory;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn lazy_pool(tenant_id: &str) -> PgPool {
    let opts = PgConnectOptions::new()
        .host("localhost")
        .database(&format!("app_{}", tenant_id));
    PgPoolOptions::new().max_connections(1).connect_lazy_with(opts)
}

/// A pool whose every acquire fails fast: nothing listens on the discard
/// port, and the short acquire timeout bounds the attempt.
pub fn unreachable_pool(tenant_id: &str) -> PgPool {
    let opts = PgConnectOptions::new()
        .host("127.0.0.1")
        .port(9)
        .database(&format!("app_{}", tenant_id));
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy_with(opts)
}

/// Counting factory. `delay` stretches each build to widen race windows;
/// `failures_remaining` makes the first N builds fail;
/// `force_create_unreachable` yields `force_create` connections on dead
/// pools, so any attach-time DDL fails.
pub struct StubFactory {
    built: AtomicUsize,
    delay: Duration,
    failures_remaining: AtomicUsize,
    force_create_unreachable: bool,
}

impl StubFactory {
    pub fn new() -> Self {
        StubFactory {
            built: AtomicUsize::new(0),
            delay: Duration::ZERO,
            failures_remaining: AtomicUsize::new(0),
            force_create_unreachable: false,
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        StubFactory {
            delay,
            ..Self::new()
        }
    }

    pub fn failing_times(n: usize) -> Self {
        StubFactory {
            failures_remaining: AtomicUsize::new(n),
            ..Self::new()
        }
    }

    pub fn force_create_unreachable() -> Self {
        StubFactory {
            force_create_unreachable: true,
            ..Self::new()
        }
    }

    /// Number of successful builds (underlying connection opens).
    pub fn build_count(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for StubFactory {
    async fn build(&self, tenant_id: &str) -> Result<TenantConnection, TenancyError> {
        if self.delay > Duration::ZERO {
            tokio::time::sleep(self.delay).await;
        }
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TenancyError::Connection {
                tenant_id: tenant_id.to_string(),
                source: sqlx::Error::PoolClosed,
            });
        }
        self.built.fetch_add(1, Ordering::SeqCst);
        if self.force_create_unreachable {
            return Ok(TenantConnection::new(
                tenant_id,
                unreachable_pool(tenant_id),
                true,
            ));
        }
        Ok(TenantConnection::new(tenant_id, lazy_pool(tenant_id), false))
    }
}
