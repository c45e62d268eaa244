//! Configuration management for the campaign bot.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Only the bot token and the administrator id are required.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted lockout, one day
pub const MAX_LOCKOUT_COOLDOWN_SECS: u64 = 86_400;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("Invalid value for {name}: {value:?}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Offending value
        value: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Telegram configuration
    pub telegram: TelegramConfig,
    /// Campaign rules
    pub campaign: CampaignConfig,
    /// `PostgreSQL` configuration; `None` runs on the in-memory store
    pub postgres: Option<PostgresConfig>,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Telegram configuration
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token
    pub token: String,
    /// Long-poll timeout in seconds
    pub poll_timeout: u64,
}

/// Campaign configuration
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Administrator Telegram user id
    pub admin_id: i64,
    /// Path of the code registry file
    pub codes_file: PathBuf,
    /// Invalid codes before a lockout
    pub lockout_max_attempts: u32,
    /// Lockout length in seconds
    pub lockout_cooldown: u64,
    /// Links shown in the social and closing messages
    pub social_links: Vec<String>,
}

/// `PostgreSQL` configuration
#[derive(Clone)]
pub struct PostgresConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

// Tokens and URLs with passwords stay out of logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram", &self.telegram)
            .field("campaign", &self.campaign)
            .field("postgres", &self.postgres)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"<redacted>")
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `BOT_TOKEN` or `ADMIN_ID` is unset,
    /// or [`ConfigError::Invalid`] if `ADMIN_ID` is not an integer or
    /// `LOCKOUT_COOLDOWN_SECS` is not between 1 and [`MAX_LOCKOUT_COOLDOWN_SECS`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// Optional numeric variables that fail to parse fall back to their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let token = present("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let admin_raw = present("ADMIN_ID").ok_or(ConfigError::Missing("ADMIN_ID"))?;
        let admin_id = admin_raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name: "ADMIN_ID",
            value: admin_raw.clone(),
        })?;
        let lockout_cooldown = match present("LOCKOUT_COOLDOWN_SECS") {
            None => 60,
            Some(raw) => raw
                .trim()
                .parse()
                .ok()
                .filter(|secs| (1..=MAX_LOCKOUT_COOLDOWN_SECS).contains(secs))
                .ok_or(ConfigError::Invalid {
                    name: "LOCKOUT_COOLDOWN_SECS",
                    value: raw,
                })?,
        };

        Ok(Self {
            telegram: TelegramConfig {
                token: token.trim().to_string(),
                poll_timeout: parse_or(present("POLL_TIMEOUT_SECS"), 30),
            },
            campaign: CampaignConfig {
                admin_id,
                codes_file: present("CODES_FILE")
                    .map_or_else(|| PathBuf::from("data/codes.txt"), PathBuf::from),
                lockout_max_attempts: parse_or(present("LOCKOUT_MAX_ATTEMPTS"), 3),
                lockout_cooldown,
                social_links: present("SOCIAL_LINKS")
                    .map(|links| {
                        links
                            .split(',')
                            .map(str::trim)
                            .filter(|link| !link.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            postgres: present("DATABASE_URL").map(|url| PostgresConfig {
                url,
                max_connections: parse_or(present("DATABASE_MAX_CONNECTIONS"), 5),
            }),
            shutdown_timeout: parse_or(present("SHUTDOWN_TIMEOUT"), 10),
        })
    }

    /// Lockout length as a calendar duration
    #[must_use]
    pub fn lockout_cooldown(&self) -> chrono::Duration {
        i64::try_from(self.campaign.lockout_cooldown)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::seconds(60))
    }

    /// Graceful shutdown timeout
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
