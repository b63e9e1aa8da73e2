use thiserror::Error;

use crate::object_store::S3Options;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    /// Maximum upload size in bytes accepted over HTTP
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// Prepended to every blob key before it reaches the backend
    pub object_prefix: String,
    pub s3: S3Config,
}

/// Settings for the s3 backend. Everything but `region` is required when
/// `STORAGE_BACKEND=s3`.
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// `host` or `host:port`
    pub endpoint: Option<String>,
    pub secure: bool,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./blobs".to_string(),
            object_prefix: String::new(),
            s3: S3Config::default(),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    value == "true" || value == "1"
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let max_upload_size = var("MAX_UPLOAD_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(5 * 1024 * 1024 * 1024); // 5GiB

        let backend = match var("STORAGE_BACKEND")
            .unwrap_or_else(|| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "local" => StorageBackend::Local,
            "s3" => StorageBackend::S3,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown STORAGE_BACKEND: {other}"
                )))
            }
        };

        let local_storage_path =
            var("LOCAL_STORAGE_PATH").unwrap_or_else(|| "./blobs".to_string());
        let object_prefix = var("OBJECT_PREFIX").unwrap_or_default();

        let s3 = S3Config {
            endpoint: var("S3_ENDPOINT"),
            secure: var("S3_SECURE").map(|v| parse_bool(&v)).unwrap_or(false),
            access_key: var("S3_ACCESS_KEY"),
            secret_key: var("S3_SECRET_KEY"),
            bucket: var("S3_BUCKET"),
            region: var("S3_REGION"),
        };

        let config = Config {
            node: NodeConfig { bind_address },
            storage: StorageConfig {
                backend,
                local_storage_path,
                object_prefix,
                s3,
            },
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.node.bind_address.is_empty() {
            return Err(ConfigError::ValidationError(
                "BIND_ADDRESS cannot be empty".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::S3 {
            let s3 = &self.storage.s3;
            let required = [
                ("S3_ENDPOINT", &s3.endpoint),
                ("S3_ACCESS_KEY", &s3.access_key),
                ("S3_SECRET_KEY", &s3.secret_key),
                ("S3_BUCKET", &s3.bucket),
            ];
            for (name, value) in required {
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    return Err(ConfigError::ValidationError(format!(
                        "{name} is required when STORAGE_BACKEND=s3"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Connection settings for the s3 backend, once validated.
    pub fn s3_options(&self) -> Option<S3Options> {
        let s3 = &self.storage.s3;
        Some(S3Options {
            endpoint: s3.endpoint.clone()?,
            secure: s3.secure,
            access_key: s3.access_key.clone()?,
            secret_key: s3.secret_key.clone()?,
            bucket: s3.bucket.clone()?,
            region: s3.region.clone(),
        })
    }
}
