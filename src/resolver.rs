//! Tenant id resolution: a pure function from request parts to a tenant id,
//! per the configured source (static id, header, or subdomain). Whitelist
//! enforcement happens here, before any connection work.

use crate::config::TenancyOptions;
use crate::error::TenancyError;

/// Resolve the tenant id for a unit of work. `header_value` is the raw value
/// of the configured `tenant_identifier` header, `host` the request's Host
/// header. An explicit static `tenant_id` in the options bypasses both.
pub fn resolve_tenant_id(
    options: &TenancyOptions,
    header_value: Option<&str>,
    host: Option<&str>,
) -> Result<String, TenancyError> {
    let tenant_id = if let Some(id) = &options.tenant_id {
        id.clone()
    } else if let Some(value) = options
        .tenant_identifier
        .as_ref()
        .and(header_value)
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        value.to_string()
    } else if options.is_tenant_from_subdomain {
        let host = host.ok_or_else(|| {
            TenancyError::Resolution("no Host header to take the subdomain from".into())
        })?;
        subdomain_of(host).ok_or_else(|| {
            TenancyError::Resolution(format!("no subdomain in host '{}'", host))
        })?
    } else if let Some(key) = &options.tenant_identifier {
        return Err(TenancyError::Resolution(format!(
            "missing tenant header '{}'",
            key
        )));
    } else {
        return Err(TenancyError::Resolution("no tenant source configured".into()));
    };

    if let Some(whitelist) = &options.whitelist {
        if !whitelist.allows(&tenant_id) {
            return Err(TenancyError::Validation(format!(
                "tenant '{}' is not whitelisted",
                tenant_id
            )));
        }
    }

    Ok(tenant_id)
}

/// First subdomain label of a host. Requires at least three labels, so
/// `acme.example.com` yields `acme` and a bare `example.com` yields nothing.
fn subdomain_of(host: &str) -> Option<String> {
    let host = host.split(':').next().unwrap_or(host);
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 3 || labels[0].is_empty() {
        return None;
    }
    Some(labels[0].to_string())
}
