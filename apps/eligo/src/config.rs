//! # Configuration
//!
//! [`AppConfig`] is layered in three steps: built-in defaults, an optional
//! JSON file, then `ELIGO_*` environment variables.

use eligo_core::documents::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "eligo=info,tower_http=info";

const MIB: u64 = 1024 * 1024;

/// Errors loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Reviewer privilege level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Reviewer,
    /// Can also replace the income limit table.
    Supervisor,
}

impl Role {
    #[must_use]
    pub fn can_edit_limits(self) -> bool {
        self == Self::Supervisor
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reviewer => "reviewer",
            Self::Supervisor => "supervisor",
        }
    }
}

/// A reviewer login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewerAccount {
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    pub password_salt: String,
    /// Lowercase hex SHA-256 of `salt + ":" + password`.
    pub password_sha256: String,
}

impl ReviewerAccount {
    /// Compare a candidate password in constant time.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        let candidate = hash_password(&self.password_salt, password);
        candidate
            .as_bytes()
            .ct_eq(self.password_sha256.as_bytes())
            .into()
    }
}

/// Credential hash stored in `password_sha256`.
#[must_use]
pub fn hash_password(salt: &str, password: &str) -> String {
    sha256_hex(format!("{salt}:{password}").as_bytes())
}

/// Throttling quotas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimits {
    /// Login attempts per username per minute.
    pub logins_per_minute: u32,
    /// New applications per minute, across all clients.
    pub starts_per_minute: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            logins_per_minute: 10,
            starts_per_minute: 60,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub bind: String,
    pub database_path: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub max_documents_per_application: usize,
    pub session_ttl_minutes: u32,
    /// Adds `Secure` to the session cookie.
    pub secure_cookies: bool,
    /// Allowed browser origins. Empty disables CORS.
    pub cors_origins: Vec<String>,
    pub reviewers: Vec<ReviewerAccount>,
    pub rate_limits: RateLimits,
    /// Limit table loaded at startup when the database has none.
    pub income_limits_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            database_path: PathBuf::from("eligo.redb"),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * MIB,
            max_documents_per_application: 20,
            session_ttl_minutes: 480,
            secure_cookies: false,
            cors_origins: Vec::new(),
            reviewers: Vec::new(),
            rate_limits: RateLimits::default(),
            income_limits_path: None,
        }
    }
}

impl AppConfig {
    /// Defaults, then the file at `path`, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `ELIGO_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ELIGO_BIND") {
            self.bind = v;
        }
        if let Some(v) = lookup("ELIGO_DATABASE") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ELIGO_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ELIGO_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_env("ELIGO_MAX_UPLOAD_BYTES", v)?;
        }
        if let Some(v) = lookup("ELIGO_SESSION_TTL_MINUTES") {
            self.session_ttl_minutes = parse_env("ELIGO_SESSION_TTL_MINUTES", v)?;
        }
        if let Some(v) = lookup("ELIGO_SECURE_COOKIES") {
            self.secure_cookies = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Env {
                        name: "ELIGO_SECURE_COOKIES",
                        value: v,
                    });
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("max_upload_bytes must be positive".into()));
        }
        if self.max_documents_per_application == 0 {
            return Err(ConfigError::Invalid(
                "max_documents_per_application must be positive".into(),
            ));
        }
        if self.session_ttl_minutes == 0 {
            return Err(ConfigError::Invalid("session_ttl_minutes must be positive".into()));
        }
        let mut seen = BTreeSet::new();
        for account in &self.reviewers {
            let username = account.username.trim();
            if username.is_empty() {
                return Err(ConfigError::Invalid("reviewer username is empty".into()));
            }
            if !seen.insert(username.to_ascii_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate reviewer username {username:?}"
                )));
            }
            if account.password_salt.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "reviewer {username:?} has an empty password_salt"
                )));
            }
            if !is_sha256_hex(&account.password_sha256) {
                return Err(ConfigError::Invalid(format!(
                    "reviewer {username:?} password_sha256 must be 64 lowercase hex characters"
                )));
            }
        }
        Ok(())
    }

    /// Account by username, case-insensitive.
    #[must_use]
    pub fn reviewer(&self, username: &str) -> Option<&ReviewerAccount> {
        let username = username.trim();
        self.reviewers
            .iter()
            .find(|a| a.username.eq_ignore_ascii_case(username))
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { name, value })
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::collections::HashMap;

    fn account(username: &str) -> ReviewerAccount {
        ReviewerAccount {
            username: username.to_string(),
            display_name: "Dana Rivera".to_string(),
            role: Role::Reviewer,
            password_salt: "pepper".to_string(),
            password_sha256: hash_password("pepper", "hunter22"),
        }
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.session_ttl_minutes, 480);
        assert_eq!(config.rate_limits.logins_per_minute, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("eligo.json");
        std::fs::write(&path, r#"{"bind": "0.0.0.0:9000", "rate_limits": {"logins_per_minute": 3}}"#)
            .expect("write");
        let config = AppConfig::from_file(&path).expect("config loads");
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.rate_limits.logins_per_minute, 3);
        assert_eq!(config.rate_limits.starts_per_minute, 60);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("eligo.json");
        std::fs::write(&path, r#"{"bnd": "x"}"#).expect("write");
        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ELIGO_BIND", "0.0.0.0:1234"),
            ("ELIGO_MAX_UPLOAD_BYTES", "2048"),
            ("ELIGO_SECURE_COOKIES", "true"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| (*v).to_string()))
            .expect("env applies");
        assert_eq!(config.bind, "0.0.0.0:1234");
        assert_eq!(config.max_upload_bytes, 2048);
        assert!(config.secure_cookies);

        let mut config = AppConfig::default();
        let bad = config.apply_env(|k| (k == "ELIGO_SESSION_TTL_MINUTES").then(|| "soon".to_string()));
        assert!(matches!(bad, Err(ConfigError::Env { .. })));
    }

    #[test]
    fn validation_rules() {
        let mut config = AppConfig {
            reviewers: vec![account("dana"), account("DANA")],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.reviewers = vec![account("dana")];
        config.reviewers[0].password_sha256 = "ABC".to_string();
        assert!(config.validate().is_err());

        config.reviewers = vec![account("dana")];
        config.reviewers[0].password_salt.clear();
        assert!(config.validate().is_err());

        config.reviewers = vec![account("dana")];
        config.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn password_check() {
        let dana = account("dana");
        assert!(dana.verify_password("hunter22"));
        assert!(!dana.verify_password("hunter23"));
        assert!(!dana.verify_password(""));

        let config = AppConfig {
            reviewers: vec![dana],
            ..Default::default()
        };
        assert!(config.reviewer(" Dana ").is_some());
        assert!(config.reviewer("someone").is_none());
    }
}
