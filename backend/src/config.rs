use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "config/watchwaste.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid public base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("No GOOGLE_API_KEY found and demo mode is disabled")]
    MissingApiKey,
    #[error("S3 storage selected but no bucket configured")]
    MissingBucket,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base address under which stored images are publicly reachable.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub upload_dir: PathBuf,
    pub s3_bucket: Option<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

/// Everything the classifier gateway needs, handed over at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub demo_mode: bool,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
    pub demo_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            public_base_url: "http://localhost:8000/static/".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            upload_dir: PathBuf::from("backend/uploads"),
            s3_bucket: None,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("backend/watchwaste.db"),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            demo_mode: false,
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
            demo_delay_ms: 2000,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn demo_delay(&self) -> Duration {
        Duration::from_millis(self.demo_delay_ms)
    }
}

impl ServerConfig {
    /// Parsed base URL, always ending in `/` so that joining keeps the full path.
    pub fn public_base(&self) -> Result<Url, ConfigError> {
        let mut raw = self.public_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Url::parse(&raw)?)
    }
}

impl AppConfig {
    /// Loads defaults, then the YAML file if one exists, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match Self::config_path() {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                Self::from_yaml_file(&path)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = env::var("WATCHWASTE_CONFIG") {
            return Some(PathBuf::from(path));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        default.exists().then_some(default)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value: port })?;
        }
        if let Some(base) = lookup("PUBLIC_BASE_URL") {
            self.server.public_base_url = base;
        }
        if let Some(backend) = lookup("STORAGE_BACKEND") {
            self.storage.backend = match backend.to_ascii_lowercase().as_str() {
                "local" => StorageBackend::Local,
                "s3" => StorageBackend::S3,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "STORAGE_BACKEND",
                        value: backend,
                    })
                }
            };
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(bucket) = lookup("S3_BUCKET_NAME") {
            self.storage.s3_bucket = Some(bucket);
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(demo) = lookup("DEMO_MODE") {
            self.classifier.demo_mode = parse_flag("DEMO_MODE", &demo)?;
        }
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            if !key.trim().is_empty() {
                self.classifier.api_key = Some(key);
            }
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.classifier.model = model;
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let base = self.server.public_base()?;
        self.server.public_base_url = base.to_string();

        if !self.classifier.demo_mode && self.classifier.api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.s3_bucket.is_none() {
            return Err(ConfigError::MissingBucket);
        }
        Ok(())
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
