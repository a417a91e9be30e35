//! Configuration loading and management
//!
//! Configuration comes from an optional YAML file (path in `DISPATCH_CONFIG`)
//! and is then overridden by environment variables:
//!
//! | Env Var           | Field             | Default                                          |
//! |-------------------|-------------------|--------------------------------------------------|
//! | `HOST`            | `host`            | `0.0.0.0`                                        |
//! | `PORT`            | `port`            | `3001`                                           |
//! | `CORS_ORIGINS`    | `allowed_origins` | `http://localhost:3000,http://localhost:5173`    |
//! | `MONITORING_FEED` | `monitoring`      | `all`                                            |

use crate::core::error::ConfigError;
use crate::core::model::ActorRole;
use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};

/// Origin entry that admits every origin
pub const ANY_ORIGIN: &str = "*";

/// Who receives the fleet-wide monitoring feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringScope {
    /// Every other open connection
    #[default]
    All,
    /// Only connections that sent `monitor:subscribe`
    Subscribers,
}

/// How identify claims are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Accept any claimed actor id
    #[default]
    Trust,
    /// Require a token from `auth.tokens` matching the claim
    StaticTokens,
}

/// A credential issued to one actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub role: ActorRole,
    pub actor_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,

    #[serde(default)]
    pub tokens: Vec<TokenGrant>,
}

/// Complete configuration of the dispatch server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed to query the HTTP surface and open a WebSocket
    #[serde(default = "default_origins")]
    pub allowed_origins: Vec<String>,

    /// Capacity of the dispatcher command queue
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    #[serde(default)]
    pub monitoring: MonitoringScope,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn default_command_buffer() -> usize {
    1024
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_origins(),
            command_buffer: default_command_buffer(),
            monitoring: MonitoringScope::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from `DISPATCH_CONFIG` (if set), apply environment overrides and validate
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("DISPATCH_CONFIG") {
            Ok(path) => Self::from_yaml_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }

        if let Some(port) = lookup("PORT") {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                message: format!("'{}' is not a valid port", port),
            })?;
        }

        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(scope) = lookup("MONITORING_FEED") {
            self.monitoring = match scope.trim() {
                "all" => MonitoringScope::All,
                "subscribers" => MonitoringScope::Subscribers,
                other => {
                    return Err(ConfigError::InvalidValue {
                        key: "MONITORING_FEED",
                        message: format!("expected 'all' or 'subscribers', got '{}'", other),
                    });
                }
            };
        }

        Ok(())
    }

    /// Check values serde cannot reject on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "command_buffer",
                message: "must be greater than zero".to_string(),
            });
        }

        if self.allowed_origins.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "allowed_origins",
                message: "at least one origin (or \"*\") is required".to_string(),
            });
        }

        for origin in &self.allowed_origins {
            if origin != ANY_ORIGIN && HeaderValue::from_str(origin).is_err() {
                return Err(ConfigError::InvalidOrigin {
                    origin: origin.clone(),
                });
            }
        }

        if self.auth.mode == AuthMode::StaticTokens && self.auth.tokens.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "auth.tokens",
                message: "static_tokens mode needs at least one token".to_string(),
            });
        }

        Ok(())
    }

    /// `host:port` to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == ANY_ORIGIN)
    }

    /// Whether a browser `Origin` header may open a connection
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allows_any_origin() || self.allowed_origins.iter().any(|o| o == origin)
    }
}
