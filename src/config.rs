//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default Instagram handle the Soulmate social lock points at.
pub const DEFAULT_SOULMATE_INSTAGRAM_URL: &str =
    "https://www.instagram.com/readyforasoulmate?igsh=ZXBsNDI2b2hsdGo1";

/// Default Instagram handle the Launchpad wizard points at.
pub const DEFAULT_LAUNCHPAD_INSTAGRAM_URL: &str = "https://instagram.com/coupleslaunchpad";

/// Funnel configuration.
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    /// Base URL of the registration service, without a trailing slash.
    pub api_base_url: String,
    /// Where the libSQL session store lives.
    pub db_path: PathBuf,
    /// Per-request timeout for the registration and admin APIs.
    pub request_timeout: Duration,
    /// How long the Launchpad social advisory stays visible.
    pub advisory_ttl: Duration,
    pub soulmate_instagram_url: String,
    pub launchpad_instagram_url: String,
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            db_path: PathBuf::from("./data/funnel.db"),
            request_timeout: Duration::from_secs(15),
            advisory_ttl: Duration::from_millis(4000),
            soulmate_instagram_url: DEFAULT_SOULMATE_INSTAGRAM_URL.to_string(),
            launchpad_instagram_url: DEFAULT_LAUNCHPAD_INSTAGRAM_URL.to_string(),
        }
    }
}

impl FunnelConfig {
    /// Build from `FUNNEL_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` is this over the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = match lookup("FUNNEL_API_BASE_URL") {
            Some(raw) => normalize_base_url(&raw)?,
            None => defaults.api_base_url,
        };

        let db_path = lookup("FUNNEL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let request_timeout = match lookup("FUNNEL_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("FUNNEL_REQUEST_TIMEOUT_SECS", &raw)?),
            None => defaults.request_timeout,
        };

        let advisory_ttl = match lookup("FUNNEL_ADVISORY_TTL_MS") {
            Some(raw) => Duration::from_millis(parse_number("FUNNEL_ADVISORY_TTL_MS", &raw)?),
            None => defaults.advisory_ttl,
        };

        let soulmate_instagram_url = lookup("FUNNEL_SOULMATE_INSTAGRAM_URL")
            .unwrap_or(defaults.soulmate_instagram_url);
        let launchpad_instagram_url = lookup("FUNNEL_LAUNCHPAD_INSTAGRAM_URL")
            .unwrap_or(defaults.launchpad_instagram_url);

        Ok(Self {
            api_base_url,
            db_path,
            request_timeout,
            advisory_ttl,
            soulmate_instagram_url,
            launchpad_instagram_url,
        })
    }
}

/// Trim whitespace and trailing slashes; require an http(s) scheme.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: "FUNNEL_API_BASE_URL".to_string(),
            message: format!("'{raw}' must start with http:// or https://"),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{raw}' is not a non-negative integer"),
    })
}
