//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::PipelineConfig;
use crate::policy::{ApprovalPolicy, ProtectedRefs};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

pub const DEFAULT_STATUS_CONTEXT: &str = "four-eyes";

pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 4;

pub const DEFAULT_DEADLINE_SECS: u64 = 30;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("failed to read private key from {path}: {source}")]
    ReadKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the service needs to run.
#[derive(Clone)]
pub struct Config {
    /// HMAC key shared with GitHub for webhook signatures.
    pub webhook_secret: Vec<u8>,
    pub app_id: u64,
    pub installation_id: u64,
    /// PEM-encoded RSA private key of the GitHub App.
    pub private_key_pem: String,
    pub protected_refs: ProtectedRefs,
    pub listen_addr: SocketAddr,
    pub pipeline: PipelineConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("protected_refs", &self.protected_refs)
            .field("listen_addr", &self.listen_addr)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| lookup(var).filter(|v| !v.trim().is_empty());
        let require = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let webhook_secret = require("FOUR_EYES_WEBHOOK_SECRET")?.into_bytes();
        let app_id = parse_number("FOUR_EYES_APP_ID", &require("FOUR_EYES_APP_ID")?)?;
        let installation_id = parse_number(
            "FOUR_EYES_INSTALLATION_ID",
            &require("FOUR_EYES_INSTALLATION_ID")?,
        )?;

        let private_key_pem = match (
            get("FOUR_EYES_PRIVATE_KEY"),
            get("FOUR_EYES_PRIVATE_KEY_PATH"),
        ) {
            (Some(pem), _) => pem,
            (None, Some(path)) => {
                let path = PathBuf::from(path);
                std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::ReadKey { path, source })?
            }
            (None, None) => return Err(ConfigError::Missing("FOUR_EYES_PRIVATE_KEY")),
        };

        let protected_refs = match get("FOUR_EYES_PROTECTED_REFS") {
            Some(list) => {
                ProtectedRefs::parse_list(&list).ok_or_else(|| ConfigError::Invalid {
                    var: "FOUR_EYES_PROTECTED_REFS",
                    reason: "no refs listed".to_string(),
                })?
            }
            None => ProtectedRefs::default(),
        };

        let listen_addr = get("FOUR_EYES_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "FOUR_EYES_LISTEN_ADDR",
                reason: e.to_string(),
            })?;

        let mut approval = ApprovalPolicy::default();
        if let Some(token) = get("FOUR_EYES_APPROVAL_TOKEN") {
            approval.approval_token = token.trim().to_string();
        }
        if let Some(size) = get("FOUR_EYES_COMMENT_PAGE_SIZE") {
            let size: u8 = parse_number("FOUR_EYES_COMMENT_PAGE_SIZE", &size)?;
            if !(1..=100).contains(&size) {
                return Err(ConfigError::Invalid {
                    var: "FOUR_EYES_COMMENT_PAGE_SIZE",
                    reason: "must be between 1 and 100".to_string(),
                });
            }
            approval.page_size = size;
        }

        let max_concurrent_checks = match get("FOUR_EYES_MAX_CONCURRENT_CHECKS") {
            Some(n) => parse_positive("FOUR_EYES_MAX_CONCURRENT_CHECKS", &n)?,
            None => DEFAULT_MAX_CONCURRENT_CHECKS,
        };

        let deadline_secs = match get("FOUR_EYES_DEADLINE_SECS") {
            Some(n) => parse_positive("FOUR_EYES_DEADLINE_SECS", &n)?,
            None => DEFAULT_DEADLINE_SECS,
        };

        let pipeline = PipelineConfig {
            approval,
            status_context: get("FOUR_EYES_STATUS_CONTEXT")
                .unwrap_or_else(|| DEFAULT_STATUS_CONTEXT.to_string()),
            max_concurrent_checks,
            deadline: Duration::from_secs(deadline_secs),
            ..PipelineConfig::default()
        };

        Ok(Config {
            webhook_secret,
            app_id,
            installation_id,
            private_key_pem,
            protected_refs,
            listen_addr,
            pipeline,
        })
    }
}

fn parse_number<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_positive<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let n: T = parse_number(var, value)?;
    if n <= T::default() {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be positive".to_string(),
        });
    }
    Ok(n)
}
