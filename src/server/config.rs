use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: i64,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Events buffered per group channel before slow receivers start lagging.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    #[serde(default = "default_true")]
    pub dedup_uploads: bool,

    #[serde(default = "default_true")]
    pub dedup_chat_saves: bool,

    /// Re-check inside the formation transaction that listed members are still ungrouped.
    #[serde(default)]
    pub enforce_ungrouped_members: bool,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
pub struct PartialServerConfig {
    listen_addr: Option<String>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    jwt_expiry_hours: Option<i64>,
    log_dir: Option<String>,
    broadcast_capacity: Option<usize>,
    dedup_uploads: Option<bool>,
    dedup_chat_saves: Option<bool>,
    enforce_ungrouped_members: Option<bool>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_database_url() -> String {
    "sqlite://peerstudy.db?mode=rwc".to_string()
}

/// Ten years.
pub const MAX_JWT_EXPIRY_HOURS: i64 = 24 * 365 * 10;

fn default_jwt_expiry_hours() -> i64 {
    24
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_broadcast_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

impl ServerConfig {
    /// Builds a config for tests and embedding, every optional field at its default.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            listen_addr: default_listen_addr(),
            database_url: default_database_url(),
            jwt_secret: jwt_secret.into(),
            jwt_expiry_hours: default_jwt_expiry_hours(),
            log_dir: default_log_dir(),
            broadcast_capacity: default_broadcast_capacity(),
            dedup_uploads: true,
            dedup_chat_saves: true,
            enforce_ungrouped_members: false,
        }
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) => Self::read_file(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    pub fn read_file(path: &Path) -> Result<PartialServerConfig, String> {
        if !path.exists() {
            return Ok(PartialServerConfig::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
    }

    pub fn merge(
        env_config: PartialServerConfig,
        file_config: PartialServerConfig,
    ) -> Result<Self, String> {
        let config = ServerConfig {
            listen_addr: env_config.listen_addr.or(file_config.listen_addr)
                .unwrap_or_else(default_listen_addr),
            database_url: env_config.database_url.or(file_config.database_url)
                .unwrap_or_else(default_database_url),
            jwt_secret: env_config.jwt_secret.or(file_config.jwt_secret)
                .ok_or("JWT_SECRET is required")?,
            jwt_expiry_hours: env_config.jwt_expiry_hours.or(file_config.jwt_expiry_hours)
                .unwrap_or_else(default_jwt_expiry_hours),
            log_dir: env_config.log_dir.or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            broadcast_capacity: env_config.broadcast_capacity.or(file_config.broadcast_capacity)
                .unwrap_or_else(default_broadcast_capacity),
            dedup_uploads: env_config.dedup_uploads.or(file_config.dedup_uploads)
                .unwrap_or(true),
            dedup_chat_saves: env_config.dedup_chat_saves.or(file_config.dedup_chat_saves)
                .unwrap_or(true),
            enforce_ungrouped_members: env_config.enforce_ungrouped_members
                .or(file_config.enforce_ungrouped_members)
                .unwrap_or(false),
        };

        if !(1..=MAX_JWT_EXPIRY_HOURS).contains(&config.jwt_expiry_hours) {
            return Err(format!(
                "JWT_EXPIRY_HOURS must be between 1 and {MAX_JWT_EXPIRY_HOURS}"
            ));
        }
        if config.broadcast_capacity == 0 {
            return Err("BROADCAST_CAPACITY must be greater than zero".to_string());
        }
        Ok(config)
    }
}
