//! Tenancy options: the full set of recognized connection/tenancy settings.
//! Data fields deserialize from JSON; function-valued fields (`uri`,
//! `validator`, the `logging` callback) are set programmatically and skipped
//! by serde.

use crate::validator::TenancyValidator;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;

/// Builds a per-tenant connection URI. Overrides the discrete
/// host/port/database fields when present.
pub type UriTemplate = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Builds a validator instance for a tenant id.
pub type ValidatorFactory = Arc<dyn Fn(&str) -> Box<dyn TenancyValidator> + Send + Sync>;

/// Invoked per executed statement with the statement text and its timing.
pub type StatementLogger = Arc<dyn Fn(&str, Option<Duration>) + Send + Sync>;

/// Statement logging on tenant connections: off, on (via the sqlx statement
/// log), or a callback invoked per executed statement. Deserializes from the
/// bool forms; the callback form is set programmatically.
#[derive(Clone, Default)]
pub enum Logging {
    #[default]
    Off,
    On,
    Callback(StatementLogger),
}

impl<'de> Deserialize<'de> for Logging {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let enabled = bool::deserialize(deserializer)?;
        Ok(if enabled { Logging::On } else { Logging::Off })
    }
}

impl std::fmt::Debug for Logging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Logging::Off => write!(f, "Off"),
            Logging::On => write!(f, "On"),
            Logging::Callback(_) => write!(f, "Callback(<fn>)"),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TenancyOptions {
    /// Explicit static tenant; bypasses request-based resolution.
    pub tenant_id: Option<String>,
    /// If `true`, tenant id is extracted from the first subdomain label.
    pub is_tenant_from_subdomain: bool,
    /// Header key to read the tenant id from (e.g. `X-Tenant-ID`).
    pub tenant_identifier: Option<String>,
    /// Database dialect. Only `postgres` is supported.
    pub dialect: String,
    /// Base database name; the tenant id is appended as `{database}_{tenant}`
    /// unless a `uri` template is set.
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ssl: bool,
    pub protocol: String,
    /// Session timezone, `+/-HH:MM` offset or a zone name.
    pub timezone: String,
    #[serde(skip)]
    pub uri: Option<UriTemplate>,
    #[serde(skip)]
    pub validator: Option<ValidatorFactory>,
    /// Allowed tenant ids: an explicit list or a regex pattern.
    pub whitelist: Option<Whitelist>,
    /// Run each model's DDL when it is attached to a connection, so schema
    /// objects exist before the first query (useful where they are otherwise
    /// created lazily).
    pub force_create_collections: bool,
    /// Statement logging on tenant connections.
    pub logging: Logging,
    /// Timeout for opening a tenant connection, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for TenancyOptions {
    fn default() -> Self {
        TenancyOptions {
            tenant_id: None,
            is_tenant_from_subdomain: false,
            tenant_identifier: None,
            dialect: "postgres".into(),
            database: None,
            username: None,
            password: None,
            host: None,
            port: None,
            ssl: false,
            protocol: "tcp".into(),
            timezone: "+00:00".into(),
            uri: None,
            validator: None,
            whitelist: None,
            force_create_collections: false,
            logging: Logging::Off,
            connect_timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for TenancyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenancyOptions")
            .field("tenant_id", &self.tenant_id)
            .field("is_tenant_from_subdomain", &self.is_tenant_from_subdomain)
            .field("tenant_identifier", &self.tenant_identifier)
            .field("dialect", &self.dialect)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("protocol", &self.protocol)
            .field("timezone", &self.timezone)
            .field("uri", &self.uri.as_ref().map(|_| "<fn>"))
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .field("whitelist", &self.whitelist)
            .field("force_create_collections", &self.force_create_collections)
            .field("logging", &self.logging)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Allowed tenant ids, as an explicit list or a regex pattern.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Whitelist {
    List(Vec<String>),
    Pattern(WhitelistPattern),
}

impl Whitelist {
    /// Compile a pattern whitelist. Fails on an invalid regex.
    pub fn pattern(pattern: &str) -> Result<Self, crate::error::TenancyError> {
        Ok(Whitelist::Pattern(WhitelistPattern::new(pattern)?))
    }

    pub fn allows(&self, tenant_id: &str) -> bool {
        match self {
            Whitelist::List(ids) => ids.iter().any(|id| id == tenant_id),
            Whitelist::Pattern(p) => p.regex.is_match(tenant_id),
        }
    }
}

/// A whitelist regex, compiled once at construction or deserialization time
/// rather than per resolution.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "String")]
pub struct WhitelistPattern {
    source: String,
    regex: Regex,
}

impl WhitelistPattern {
    pub fn new(pattern: &str) -> Result<Self, crate::error::TenancyError> {
        let regex = Regex::new(pattern).map_err(|e| {
            crate::error::TenancyError::Config(format!("invalid whitelist pattern: {}", e))
        })?;
        Ok(WhitelistPattern {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl TryFrom<String> for WhitelistPattern {
    type Error = crate::error::TenancyError;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        WhitelistPattern::new(&pattern)
    }
}
