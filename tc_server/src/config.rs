//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use tablechat::db::DatabaseConfig;

/// Default bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:6969";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration; `None` keeps the chat log in memory
    pub database: Option<DatabaseConfig>,
    /// Chat relay configuration
    pub bridge: BridgeConfig,
    /// Capacity of each session's outbound message queue
    pub outbound_buffer: usize,
    /// Number of tables to create on startup
    pub num_tables: usize,
}

/// Chat relay configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Webhook lobby chat is posted to; relaying is disabled when unset
    pub webhook_url: Option<String>,
    /// Timeout of one webhook request in seconds
    pub timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `num_tables_override` - Optional number of tables override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        num_tables_override: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => {
                let raw = std::env::var("SERVER_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
                raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "SERVER_BIND".to_string(),
                    reason: format!("\"{raw}\" is not an IP:PORT address"),
                })?
            }
        };

        let database = match (DatabaseConfig::from_env(), database_url_override) {
            (Some(config), Some(database_url)) => Some(DatabaseConfig {
                database_url,
                ..config
            }),
            (None, Some(database_url)) => Some(DatabaseConfig {
                database_url,
                ..DatabaseConfig::default()
            }),
            (config, None) => config,
        };

        let bridge = BridgeConfig {
            webhook_url: std::env::var("BRIDGE_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            timeout_secs: parse_env_or("BRIDGE_TIMEOUT_SECS", 5),
        };

        Ok(ServerConfig {
            bind,
            database,
            bridge,
            outbound_buffer: parse_env_or("CHAT_OUTBOUND_BUFFER", 256),
            num_tables: num_tables_override.unwrap_or_else(|| parse_env_or("INITIAL_TABLES", 0)),
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_buffer == 0 {
            return Err(ConfigError::Invalid {
                var: "CHAT_OUTBOUND_BUFFER".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if let Some(database) = &self.database {
            if database.max_connections == 0 {
                return Err(ConfigError::Invalid {
                    var: "DB_MAX_CONNECTIONS".to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }

            if database.min_connections > database.max_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MIN_CONNECTIONS".to_string(),
                    reason: format!(
                        "Cannot exceed max connections ({})",
                        database.max_connections
                    ),
                });
            }
        }

        if let Some(url) = &self.bridge.webhook_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                var: "BRIDGE_WEBHOOK_URL".to_string(),
                reason: "Must be an http(s) URL".to_string(),
            });
        }

        if self.bridge.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "BRIDGE_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            database: None,
            bridge: BridgeConfig {
                webhook_url: None,
                timeout_secs: 5,
            },
            outbound_buffer: 64,
            num_tables: 0,
        }
    }

    fn clear_env() {
        // SAFETY: tests touching the environment are serialized
        unsafe {
            for key in [
                "SERVER_BIND",
                "DATABASE_URL",
                "DB_MAX_CONNECTIONS",
                "BRIDGE_WEBHOOK_URL",
                "CHAT_OUTBOUND_BUFFER",
                "INITIAL_TABLES",
            ] {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "SERVER_BIND".to_string(),
            reason: "bad".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SERVER_BIND"));
        assert!(msg.contains("bad"));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_zero_outbound_buffer_rejected() {
        let config = ServerConfig {
            outbound_buffer: 0,
            ..valid_config()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Invalid { var, .. } if var == "CHAT_OUTBOUND_BUFFER"
        ));
    }

    #[test]
    fn test_pool_bounds_checked() {
        let config = ServerConfig {
            database: Some(DatabaseConfig {
                min_connections: 10,
                max_connections: 5,
                ..DatabaseConfig::development()
            }),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_webhook_must_be_http() {
        let mut config = valid_config();
        config.bridge.webhook_url = Some("ftp://example.com/hook".to_string());
        assert!(config.validate().is_err());

        config.bridge.webhook_url = Some("https://example.com/hook".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = ServerConfig::from_env(None, None, None).unwrap();
        assert_eq!(config.bind, DEFAULT_BIND.parse().unwrap());
        assert!(config.database.is_none());
        assert!(config.bridge.webhook_url.is_none());
        assert_eq!(config.outbound_buffer, 256);
        assert_eq!(config.num_tables, 0);
    }

    #[test]
    #[serial]
    fn test_env_values_are_read() {
        clear_env();
        // SAFETY: tests touching the environment are serialized
        unsafe {
            std::env::set_var("SERVER_BIND", "0.0.0.0:9000");
            std::env::set_var("DATABASE_URL", "postgres://chat@db/chat");
            std::env::set_var("DB_MAX_CONNECTIONS", "7");
            std::env::set_var("CHAT_OUTBOUND_BUFFER", "32");
        }

        let config = ServerConfig::from_env(None, None, Some(3)).unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000".parse().unwrap());
        let database = config.database.unwrap();
        assert_eq!(database.database_url, "postgres://chat@db/chat");
        assert_eq!(database.max_connections, 7);
        assert_eq!(config.outbound_buffer, 32);
        assert_eq!(config.num_tables, 3);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_cli_overrides_env() {
        clear_env();
        // SAFETY: tests touching the environment are serialized
        unsafe {
            std::env::set_var("SERVER_BIND", "0.0.0.0:9000");
        }

        let config = ServerConfig::from_env(
            Some("127.0.0.1:7000".parse().unwrap()),
            Some("postgres://override/chat".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(
            config.database.unwrap().database_url,
            "postgres://override/chat"
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_bad_bind_is_an_error() {
        clear_env();
        // SAFETY: tests touching the environment are serialized
        unsafe {
            std::env::set_var("SERVER_BIND", "not an address");
        }
        assert!(ServerConfig::from_env(None, None, None).is_err());
        clear_env();
    }
}
