//! # Configuration
//!
//! TOML configuration for the game server, split into sections:
//!
//! - [`ServerConfig`] - listener address and connection limits
//! - [`StorageConfig`] - where the sled database lives
//! - [`LoggingConfig`] - log level and optional log file
//! - [`GameConfig`] - gameplay defaults
//! - [`AuthConfig`] - accounts allowed to log in
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1:7878"
//! max_connections = 64
//! max_frame_bytes = 16384
//!
//! [storage]
//! data_dir = "./data"
//!
//! [logging]
//! level = "info"
//!
//! [game]
//! default_performance_score = 1.0
//! max_chat_bytes = 2000
//!
//! [auth]
//! allow_guests = false
//!
//! [auth.users]
//! alice = "$argon2id$v=19$..."
//! ```
//!
//! Every section has defaults, so a partial file is fine.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub max_connections: usize,
    /// Longest accepted request line, in bytes.
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7878".to_string(),
            max_connections: 64,
            max_frame_bytes: 16 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

impl StorageConfig {
    /// Location of the sled database: `<data_dir>/game`.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("game")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Score used for tavern and final-quest performances when a request
    /// does not carry one.
    pub default_performance_score: f64,
    pub max_chat_bytes: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_performance_score: 1.0,
            max_chat_bytes: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Username to argon2 PHC hash.
    #[serde(default)]
    pub users: BTreeMap<String, String>,
    /// Let unknown usernames in without a password.
    #[serde(default)]
    pub allow_guests: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;
        let config = Self::from_toml(&content)
            .map_err(|e| anyhow!("Failed to load config file {}: {}", path, e))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let score = self.game.default_performance_score;
        if !(0.0..=1.0).contains(&score) {
            bail!("game.default_performance_score must be between 0 and 1, got {}", score);
        }
        if self.server.max_connections == 0 {
            bail!("server.max_connections must be at least 1");
        }
        if self.server.max_frame_bytes < 256 {
            bail!("server.max_frame_bytes must be at least 256");
        }
        if self.game.max_chat_bytes == 0 {
            bail!("game.max_chat_bytes must be at least 1");
        }
        if self.storage.data_dir.trim().is_empty() {
            bail!("storage.data_dir must not be empty");
        }
        for (user, hash) in &self.auth.users {
            if password_hash::PasswordHash::new(hash).is_err() {
                bail!("auth.users.{} is not a valid password hash", user);
            }
        }
        Ok(())
    }
}
