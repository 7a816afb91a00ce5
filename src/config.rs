use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the wine search server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Connection string of the MongoDB deployment holding the catalog.
    pub mongo_uri: String,
    /// Database that owns the wine collection and the flag bucket.
    pub database_name: String,
    /// Collection storing wine records with their embedded comments.
    pub collection_name: String,
    /// GridFS bucket holding flag images.
    pub gridfs_bucket: String,
    /// Directory served under `/static`; must contain `default.png`.
    pub static_dir: PathBuf,
    /// HTTP listen port.
    pub server_port: u16,
    /// Development mode: verbose default logging.
    pub debug: bool,
}

const DEFAULT_PORT: u16 = 3000;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            mongo_uri: load_env("MONGO_URI")?,
            database_name: load_env_optional("MONGO_DB").unwrap_or_else(|| "appdb".into()),
            collection_name: load_env_optional("WINES_COLLECTION")
                .unwrap_or_else(|| "wines".into()),
            gridfs_bucket: load_env_optional("FLAGS_BUCKET").unwrap_or_else(|| "flags".into()),
            static_dir: load_env_optional("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            server_port: load_env_optional("PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("PORT".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_PORT),
            debug: debug_requested(
                load_env_optional("APP_ENV").as_deref(),
                load_env_optional("APP_DEBUG").as_deref(),
            ),
        })
    }

    /// Location of the asset served when a flag image cannot be resolved.
    pub fn default_image_path(&self) -> PathBuf {
        self.static_dir.join("default.png")
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn debug_requested(app_env: Option<&str>, app_debug: Option<&str>) -> bool {
    let development = app_env
        .map(|value| value.trim().eq_ignore_ascii_case("development"))
        .unwrap_or(false);
    let flagged = app_debug
        .map(|value| {
            matches!(
                value.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false);
    development || flagged
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        database = %config.database_name,
        collection = %config.collection_name,
        bucket = %config.gridfs_bucket,
        server_port = config.server_port,
        debug = config.debug,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_accepts_development_env() {
        assert!(debug_requested(Some("development"), None));
        assert!(debug_requested(Some(" Development "), None));
        assert!(!debug_requested(Some("production"), None));
    }

    #[test]
    fn debug_flag_accepts_truthy_switch() {
        assert!(debug_requested(None, Some("1")));
        assert!(debug_requested(None, Some("TRUE")));
        assert!(!debug_requested(None, Some("0")));
        assert!(!debug_requested(None, None));
    }

    #[test]
    fn default_image_lives_in_static_dir() {
        let config = Config {
            mongo_uri: "mongodb://localhost:27017".into(),
            database_name: "appdb".into(),
            collection_name: "wines".into(),
            gridfs_bucket: "flags".into(),
            static_dir: PathBuf::from("assets"),
            server_port: DEFAULT_PORT,
            debug: false,
        };
        assert_eq!(
            config.default_image_path(),
            PathBuf::from("assets").join("default.png")
        );
    }
}
