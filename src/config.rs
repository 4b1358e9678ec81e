//!
//! matchdesk configuration
//! -----------------------
//! `AppConfig` is built once at process start from CLI flags, then
//! environment variables, then defaults, validated, and shared by reference.
//! Nothing reads the environment after start-up.

use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use crate::identity::{PolicyError, RoutePolicy, SessionIssuer};

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_DB_FOLDER: &str = "data";
pub const DEFAULT_SESSION_TTL_SECS: i64 = 8 * 3600;
pub const DEFAULT_COOKIE_NAME: &str = "matchdesk_session";
pub const MIN_SECRET_LEN: usize = 32;

pub const USAGE: &str = "matchdesk server

USAGE:
  matchdesk [--http-port N] [--db-folder PATH] [--session-ttl-secs N] [--policy-file PATH] [--insecure-cookies]

OPTIONS:
  --http-port N          HTTP port (env: MATCHDESK_HTTP_PORT, default 3000)
  --db-folder PATH       Document store folder (env: MATCHDESK_DB_FOLDER, default data)
  --session-ttl-secs N   Session lifetime (env: MATCHDESK_SESSION_TTL_SECS, default 28800)
  --policy-file PATH     JSON zone table (env: MATCHDESK_POLICY_FILE)
  --insecure-cookies     Drop the Secure cookie attribute (env: MATCHDESK_COOKIE_SECURE=false)

ENVIRONMENT:
  MATCHDESK_SESSION_SECRET     HMAC key for session tokens (required, >= 32 bytes)
  MATCHDESK_COOKIE_NAME        Session cookie name (default matchdesk_session)
  MATCHDESK_STATUS_REVOCATION  Re-check account status on each request (default true)
  MATCHDESK_WORKFLOW_URL       Outbound analysis workflow webhook
  MATCHDESK_WORKFLOW_API_KEY   Key sent to the workflow as x-api-key
  MATCHDESK_WEBHOOK_SECRET     Key required on inbound workflow callbacks
  MATCHDESK_ADMIN_USERNAME     Bootstrap admin, created when no users exist
  MATCHDESK_ADMIN_PASSWORD
";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MATCHDESK_SESSION_SECRET is required")]
    MissingSecret,
    #[error("session secret must be at least 32 bytes")]
    WeakSecret,
    #[error("invalid value for {0}: '{1}'")]
    InvalidValue(&'static str, String),
    #[error("bootstrap admin needs both MATCHDESK_ADMIN_USERNAME and MATCHDESK_ADMIN_PASSWORD")]
    IncompleteBootstrap,
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Shared secret expected in `x-api-key` on inbound callbacks.
    pub inbound_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_port: u16,
    /// `None` keeps the store in memory only.
    pub db_root: Option<PathBuf>,
    pub session_secret: Vec<u8>,
    pub session_ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub enforce_status_revocation: bool,
    pub policy_file: Option<PathBuf>,
    pub workflow: WorkflowConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    /// Configuration with defaults and an explicit secret, for tests and
    /// embedding.
    pub fn with_secret(secret: &str) -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            db_root: None,
            session_secret: secret.as_bytes().to_vec(),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_secure: true,
            enforce_status_revocation: true,
            policy_file: None,
            workflow: WorkflowConfig { url: None, api_key: None, inbound_secret: None },
            bootstrap_admin: None,
        }
    }

    pub fn from_env_and_args() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |name| std::env::var(name).ok())
    }

    /// Resolve configuration: CLI arguments override environment, which
    /// overrides defaults.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = |name: &str| env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let http_port = match arg_value(args, "--http-port").or_else(|| env("MATCHDESK_HTTP_PORT")) {
            Some(v) => v.parse::<u16>().map_err(|_| ConfigError::InvalidValue("http port", v))?,
            None => DEFAULT_HTTP_PORT,
        };
        let db_root = arg_value(args, "--db-folder")
            .or_else(|| env("MATCHDESK_DB_FOLDER"))
            .unwrap_or_else(|| DEFAULT_DB_FOLDER.to_string());

        let secret = env("MATCHDESK_SESSION_SECRET").ok_or(ConfigError::MissingSecret)?;
        if secret.len() < MIN_SECRET_LEN { return Err(ConfigError::WeakSecret); }

        let ttl_secs = match arg_value(args, "--session-ttl-secs").or_else(|| env("MATCHDESK_SESSION_TTL_SECS")) {
            Some(v) => match v.parse::<i64>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidValue("session ttl", v)),
            },
            None => DEFAULT_SESSION_TTL_SECS,
        };

        let cookie_secure = if has_flag(args, "--insecure-cookies") {
            false
        } else {
            parse_bool_env(env("MATCHDESK_COOKIE_SECURE"), "MATCHDESK_COOKIE_SECURE")?.unwrap_or(true)
        };
        let enforce_status_revocation = parse_bool_env(env("MATCHDESK_STATUS_REVOCATION"), "MATCHDESK_STATUS_REVOCATION")?.unwrap_or(true);

        let bootstrap_admin = match (env("MATCHDESK_ADMIN_USERNAME"), env("MATCHDESK_ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteBootstrap),
        };

        let cfg = Self {
            http_port,
            db_root: Some(PathBuf::from(db_root)),
            session_secret: secret.into_bytes(),
            session_ttl: Duration::seconds(ttl_secs),
            cookie_name: env("MATCHDESK_COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            cookie_secure,
            enforce_status_revocation,
            policy_file: arg_value(args, "--policy-file").or_else(|| env("MATCHDESK_POLICY_FILE")).map(PathBuf::from),
            workflow: WorkflowConfig {
                url: env("MATCHDESK_WORKFLOW_URL"),
                api_key: env("MATCHDESK_WORKFLOW_API_KEY"),
                inbound_secret: env("MATCHDESK_WEBHOOK_SECRET"),
            },
            bootstrap_admin,
        };
        Ok(cfg)
    }

    pub fn session_issuer(&self) -> SessionIssuer { SessionIssuer::new(&self.session_secret, self.session_ttl) }

    /// The zone table: the policy file when configured, else the built-in one.
    pub fn route_policy(&self) -> Result<RoutePolicy, ConfigError> {
        match &self.policy_file {
            Some(p) => Ok(RoutePolicy::load_file(p)?),
            None => Ok(RoutePolicy::builtin()),
        }
    }
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn parse_bool_env(val: Option<String>, name: &'static str) -> Result<Option<bool>, ConfigError> {
    let Some(v) = val else { return Ok(None); };
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue(name, v)),
    }
}
