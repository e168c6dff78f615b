//! Process configuration read from environment variables.

use std::path::PathBuf;

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// What an edit of an already-published post does to `publishedAt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepublishPolicy {
    /// Every published update stamps the current time.
    #[default]
    Refresh,
    /// The first publish time is kept.
    KeepFirst,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub data_dir: Option<PathBuf>,
    pub frontend_url: Option<String>,
    pub enable_hsts: bool,
    pub bootstrap_admin_emails: Vec<String>,
    pub republish: RepublishPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }

        let bootstrap_admin_emails = get("BOOTSTRAP_ADMIN_EMAILS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let republish = if parse_flag(&get, "REPUBLISH_REFRESHES_TIMESTAMP", true)? {
            RepublishPolicy::Refresh
        } else {
            RepublishPolicy::KeepFirst
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_num(&get, "PORT", 8080)?,
            jwt_secret,
            jwt_ttl_hours: parse_num(&get, "JWT_TTL_HOURS", 24)?,
            database_url: get("DATABASE_URL").filter(|s| !s.is_empty()),
            db_max_connections: parse_num(&get, "DB_MAX_CONNECTIONS", 5)?,
            data_dir: get("SCRIBE_DATA_DIR").filter(|s| !s.is_empty()).map(PathBuf::from),
            frontend_url: get("FRONTEND_URL").filter(|s| !s.is_empty()),
            enable_hsts: parse_flag(&get, "ENABLE_HSTS", false)?,
            bootstrap_admin_emails,
            republish,
        })
    }
}

fn parse_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid { var, reason: e.to_string() }),
    }
}

fn parse_flag(get: &impl Fn(&str) -> Option<String>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match get(var).as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) if v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => Ok(true),
        Some(v) if v == "0" || v.eq_ignore_ascii_case("false") || v.eq_ignore_ascii_case("no") => Ok(false),
        Some(v) => Err(ConfigError::Invalid { var, reason: format!("expected a boolean, got {v:?}") }),
    }
}
