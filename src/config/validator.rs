//! Option validation: dialect and protocol support, tenant source, connection target.

use crate::config::TenancyOptions;
use crate::error::TenancyError;
use regex::Regex;

pub fn validate_options(options: &TenancyOptions) -> Result<(), TenancyError> {
    if !matches!(options.dialect.as_str(), "postgres" | "postgresql") {
        return Err(TenancyError::Config(format!(
            "unsupported dialect: {} (only postgres is supported)",
            options.dialect
        )));
    }

    if options.protocol != "tcp" {
        return Err(TenancyError::Config(format!(
            "unsupported protocol: {} (only tcp is supported)",
            options.protocol
        )));
    }

    if options.tenant_id.is_none()
        && options.tenant_identifier.is_none()
        && !options.is_tenant_from_subdomain
    {
        return Err(TenancyError::Config(
            "no tenant source: set tenant_id, tenant_identifier, or is_tenant_from_subdomain".into(),
        ));
    }

    if options.uri.is_none() && options.database.is_none() {
        return Err(TenancyError::Config(
            "database is required when no uri template is set".into(),
        ));
    }

    let tz_ok = Regex::new(r"^([+-]\d{2}:\d{2}|[A-Za-z][A-Za-z0-9_+/-]*)$")
        .map(|re| re.is_match(&options.timezone))
        .unwrap_or(false);
    if !tz_ok {
        return Err(TenancyError::Config(format!(
            "invalid timezone: {} (expected +/-HH:MM or a zone name)",
            options.timezone
        )));
    }

    if options.connect_timeout_secs == 0 {
        return Err(TenancyError::Config("connect_timeout_secs must be positive".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> TenancyOptions {
        TenancyOptions {
            tenant_identifier: Some("X-Tenant-ID".into()),
            database: Some("app".into()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_minimal_header_options() {
        assert!(validate_options(&base()).is_ok());
    }

    #[test]
    fn rejects_unsupported_dialect() {
        let mut o = base();
        o.dialect = "mysql".into();
        let err = validate_options(&o).unwrap_err();
        assert!(err.to_string().contains("unsupported dialect"));
    }

    #[test]
    fn rejects_missing_tenant_source() {
        let mut o = base();
        o.tenant_identifier = None;
        assert!(validate_options(&o).is_err());
    }

    #[test]
    fn static_tenant_counts_as_a_source() {
        let mut o = base();
        o.tenant_identifier = None;
        o.tenant_id = Some("acme".into());
        assert!(validate_options(&o).is_ok());
    }

    #[test]
    fn rejects_missing_database_without_uri() {
        let mut o = base();
        o.database = None;
        assert!(validate_options(&o).is_err());
    }

    #[test]
    fn uri_template_replaces_discrete_fields() {
        let mut o = base();
        o.database = None;
        o.uri = Some(std::sync::Arc::new(|t: &str| format!("postgres://db/app_{}", t)));
        assert!(validate_options(&o).is_ok());
    }

    #[test]
    fn accepts_offset_and_named_timezones() {
        let mut o = base();
        o.timezone = "-05:30".into();
        assert!(validate_options(&o).is_ok());
        o.timezone = "America/Los_Angeles".into();
        assert!(validate_options(&o).is_ok());
        o.timezone = "not a zone!".into();
        assert!(validate_options(&o).is_err());
    }
}
