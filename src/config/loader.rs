//! One-shot option resolution: a plain options value, or an async factory for
//! options that depend on other runtime-resolved configuration. Either way the
//! result is an immutable `Arc<TenancyOptions>` produced once at startup; the
//! registry never re-reads configuration sources.

use crate::config::{validate_options, TenancyOptions};
use crate::error::TenancyError;
use async_trait::async_trait;
use std::sync::Arc;

/// Async source of tenancy options, for setups where the options depend on
/// other injected configuration (secrets manager, central config DB, ...).
#[async_trait]
pub trait TenancyOptionsFactory: Send + Sync {
    async fn create_tenancy_options(&self) -> Result<TenancyOptions, TenancyError>;
}

/// Validate and freeze options (synchronous setup mode).
pub fn resolve_options(options: TenancyOptions) -> Result<Arc<TenancyOptions>, TenancyError> {
    validate_options(&options)?;
    Ok(Arc::new(options))
}

/// Resolve options through a factory, once (asynchronous setup mode).
pub async fn resolve_options_with(
    factory: &dyn TenancyOptionsFactory,
) -> Result<Arc<TenancyOptions>, TenancyError> {
    resolve_options(factory.create_tenancy_options().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvBackedFactory {
        database: String,
    }

    #[async_trait]
    impl TenancyOptionsFactory for EnvBackedFactory {
        async fn create_tenancy_options(&self) -> Result<TenancyOptions, TenancyError> {
            Ok(TenancyOptions {
                tenant_identifier: Some("X-Tenant-ID".into()),
                database: Some(self.database.clone()),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn factory_options_are_validated() {
        let factory = EnvBackedFactory { database: "app".into() };
        let options = resolve_options_with(&factory).await.unwrap();
        assert_eq!(options.database.as_deref(), Some("app"));
    }

    #[test]
    fn invalid_options_fail_resolution() {
        let err = resolve_options(TenancyOptions::default()).unwrap_err();
        assert!(matches!(err, TenancyError::Config(_)));
    }
}
