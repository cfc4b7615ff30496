//! Configuration for IMAP accounts and engine-wide settings
//!
//! Account credentials and connection details are loaded from environment
//! variables following the pattern `PHISHSENTRY_<KEY>`. This engine drives
//! one account per process; multi-account orchestration belongs to the GUI
//! front-end (out of scope for this crate).

use std::env;
use std::env::VarError;
use std::path::PathBuf;

use secrecy::SecretString;

use crate::errors::{AppError, AppResult};

/// How an account authenticates to its IMAP server.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Plain `LOGIN` with a password.
    Password,
    /// `AUTHENTICATE XOAUTH2` with an already-obtained access token.
    OAuth2,
}

/// Known provider presets, used only to pick a sensible default
/// [`AuthMethod`] — connection details still come from explicit
/// environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    ICloud,
    Outlook,
    Gmail,
    Custom,
}

impl Provider {
    /// Gmail and Outlook default to OAuth2; iCloud and custom servers
    /// default to password auth.
    pub fn default_auth_method(self) -> AuthMethod {
        match self {
            Provider::Gmail | Provider::Outlook => AuthMethod::OAuth2,
            Provider::ICloud | Provider::Custom => AuthMethod::Password,
        }
    }

    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "icloud" => Provider::ICloud,
            "outlook" => Provider::Outlook,
            "gmail" => Provider::Gmail,
            _ => Provider::Custom,
        }
    }
}

/// A credential presented to the monitor at `start()` time.
///
/// The OAuth2 access token is received already-obtained (token refresh and
/// the authorization-code browser flow are out of scope, per spec §6).
#[derive(Debug, Clone)]
pub enum Credential {
    Password(SecretString),
    OAuth2 {
        email: String,
        access_token: SecretString,
    },
}

/// IMAP account configuration
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Account identifier, used in logs and in persisted verdict lookups
    /// that are scoped per-account by the caller.
    pub id: String,
    /// Display name shown to the user (GUI concern; kept for completeness).
    pub display_name: String,
    pub imap_server: String,
    pub imap_port: u16,
    pub username: String,
    pub use_tls: bool,
    pub auth_method: AuthMethod,
    pub provider: Provider,
}

impl AccountConfig {
    /// Load a single account's connection details from environment
    /// variables:
    ///
    /// - `PHISHSENTRY_ACCOUNT_ID` (default `"default"`)
    /// - `PHISHSENTRY_DISPLAY_NAME` (default: same as username)
    /// - `PHISHSENTRY_IMAP_HOST` (required)
    /// - `PHISHSENTRY_IMAP_PORT` (default `993`)
    /// - `PHISHSENTRY_IMAP_USER` (required)
    /// - `PHISHSENTRY_IMAP_TLS` (default `true`)
    /// - `PHISHSENTRY_PROVIDER` (default `custom`)
    pub fn load_from_env() -> AppResult<Self> {
        let username = required_env("PHISHSENTRY_IMAP_USER")?;
        let host = required_env("PHISHSENTRY_IMAP_HOST")?;
        let provider = Provider::parse(&env::var("PHISHSENTRY_PROVIDER").unwrap_or_default());

        Ok(Self {
            id: env::var("PHISHSENTRY_ACCOUNT_ID").unwrap_or_else(|_| "default".to_owned()),
            display_name: env::var("PHISHSENTRY_DISPLAY_NAME").unwrap_or_else(|_| username.clone()),
            imap_server: host,
            imap_port: parse_u16_env("PHISHSENTRY_IMAP_PORT", 993)?,
            username,
            use_tls: parse_bool_env("PHISHSENTRY_IMAP_TLS", true)?,
            auth_method: provider.default_auth_method(),
            provider,
        })
    }
}

/// Engine-wide settings controlling the IDLE heartbeat, blacklist refresh
/// cadence, scan worker pool size, and database location.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the SQLite database file, or `:memory:` for tests.
    pub database_path: PathBuf,
    /// Seconds between DONE/NOOP/IDLE re-issuance while idling (spec §4.I).
    pub idle_interval_seconds: u64,
    /// Hours between blacklist refreshes (spec §9 open question).
    pub blacklist_refresh_interval_hours: u64,
    /// Number of additional scan worker connections (spec §4.J, `W=10`).
    pub scan_worker_count: usize,
    /// Verdict purge threshold in days (spec §3 lifecycle, default 30).
    pub verdict_retention_days: i64,
    /// Safeonweb campaign freshness window in days (spec §4.D, fixed at 90
    /// by spec but kept configurable for tests).
    pub campaign_retention_days: i64,
}

impl EngineConfig {
    pub fn load_from_env() -> AppResult<Self> {
        let database_path = match env::var("PHISHSENTRY_DATABASE_PATH") {
            Ok(p) => PathBuf::from(p),
            Err(VarError::NotPresent) => default_database_path()?,
            Err(VarError::NotUnicode(_)) => {
                return Err(AppError::Validation(
                    "PHISHSENTRY_DATABASE_PATH contains non-unicode data".to_owned(),
                ));
            }
        };

        Ok(Self {
            database_path,
            idle_interval_seconds: parse_u64_env("PHISHSENTRY_IDLE_INTERVAL_SECONDS", 300)?,
            blacklist_refresh_interval_hours: parse_u64_env(
                "PHISHSENTRY_BLACKLIST_REFRESH_HOURS",
                12,
            )?,
            scan_worker_count: parse_usize_env("PHISHSENTRY_SCAN_WORKERS", 10)?,
            verdict_retention_days: parse_i64_env("PHISHSENTRY_VERDICT_RETENTION_DAYS", 30)?,
            campaign_retention_days: parse_i64_env("PHISHSENTRY_CAMPAIGN_RETENTION_DAYS", 90)?,
        })
    }

    /// Engine config suitable for tests: in-memory database, short
    /// intervals are irrelevant since no background task runs.
    pub fn in_memory_for_tests() -> Self {
        Self {
            database_path: PathBuf::from(":memory:"),
            idle_interval_seconds: 300,
            blacklist_refresh_interval_hours: 12,
            scan_worker_count: 10,
            verdict_retention_days: 30,
            campaign_retention_days: 90,
        }
    }
}

/// Default application-data path: `$XDG_DATA_HOME/phishsentry/phishsentry.db`
/// or platform equivalent, creating the directory if absent.
fn default_database_path() -> AppResult<PathBuf> {
    let mut dir = dirs::data_dir()
        .ok_or_else(|| AppError::Storage("could not determine application data directory".to_owned()))?;
    dir.push("phishsentry");
    std::fs::create_dir_all(&dir)?;
    dir.push("phishsentry.db");
    Ok(dir)
}

/// Read a required environment variable, returning error if missing or empty
fn required_env(key: &str) -> AppResult<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!(
            "missing required environment variable {key}"
        ))),
    }
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_bool_env(key: &str, default: bool) -> AppResult<bool> {
    match env::var(key) {
        Ok(v) => parse_bool_value(&v).ok_or_else(|| {
            AppError::Validation(format!("invalid boolean environment variable {key}: '{v}'"))
        }),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::Validation(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

fn parse_u16_env(key: &str, default: u16) -> AppResult<u16> {
    match env::var(key) {
        Ok(v) => v
            .parse::<u16>()
            .map_err(|_| AppError::Validation(format!("invalid u16 environment variable {key}: '{v}'"))),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::Validation(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

fn parse_u64_env(key: &str, default: u64) -> AppResult<u64> {
    match env::var(key) {
        Ok(v) => v
            .parse::<u64>()
            .map_err(|_| AppError::Validation(format!("invalid u64 environment variable {key}: '{v}'"))),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::Validation(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

fn parse_i64_env(key: &str, default: i64) -> AppResult<i64> {
    match env::var(key) {
        Ok(v) => v
            .parse::<i64>()
            .map_err(|_| AppError::Validation(format!("invalid i64 environment variable {key}: '{v}'"))),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::Validation(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

fn parse_usize_env(key: &str, default: usize) -> AppResult<usize> {
    match env::var(key) {
        Ok(v) => v
            .parse::<usize>()
            .map_err(|_| AppError::Validation(format!("invalid usize environment variable {key}: '{v}'"))),
        Err(VarError::NotPresent) => Ok(default),
        Err(VarError::NotUnicode(_)) => Err(AppError::Validation(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}
