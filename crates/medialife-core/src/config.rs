//! Configuration module
//!
//! Settings are read from the process environment (and an optional `.env` file) once at startup.
//! [`Config`] is the cheaply clonable handle handed to the wiring code; [`ServiceConfig`] holds the
//! raw values.

use std::env;

use crate::constants::{
    DEFAULT_IMAGE_QUALITY, MAX_FILE_SIZE_BYTES, SERVICE_NAME, SUPPORTED_CONTENT_TYPES,
};
use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub environment: String,
    pub service_name: String,
    /// Absent means the in-memory store is used (development only).
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // MinIO and other S3-compatible providers
    pub signed_url_ttl_secs: u64,
    // Upload and processing
    pub max_file_size_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub image_quality: u8,
    pub ffmpeg_path: Option<String>,
    pub video_thumbnail_offset_secs: f64,
    // Task queue
    pub task_queue_max_workers: usize,
    pub task_queue_max_retries: u32,
    pub task_queue_capacity: usize,
    pub pending_sweep_limit: i64,
    pub log_format: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            service_name: SERVICE_NAME.to_string(),
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            storage_backend: StorageBackend::Memory,
            local_storage_path: None,
            local_storage_base_url: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            signed_url_ttl_secs: 3600,
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            allowed_content_types: SUPPORTED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            image_quality: DEFAULT_IMAGE_QUALITY,
            ffmpeg_path: None,
            video_thumbnail_offset_secs: 1.0,
            task_queue_max_workers: 4,
            task_queue_max_retries: 3,
            task_queue_capacity: 1024,
            pending_sweep_limit: 50,
            log_format: "pretty".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_FILE_SIZE_MB: u64 = 100;
        const SIGNED_URL_TTL_SECS: u64 = 3600;
        const VIDEO_THUMBNAIL_OFFSET_SECS: f64 = 1.0;
        const TASK_QUEUE_MAX_WORKERS: usize = 4;
        const TASK_QUEUE_MAX_RETRIES: u32 = 3;
        const TASK_QUEUE_CAPACITY: usize = 1024;
        const PENDING_SWEEP_LIMIT: i64 = 50;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(raw) => raw
                .parse::<StorageBackend>()
                .map_err(|e| anyhow::anyhow!("STORAGE_BACKEND is invalid: {}", e))?,
            Err(_) => StorageBackend::Local,
        };

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let allowed_content_types = match env::var("ALLOWED_CONTENT_TYPES") {
            Ok(raw) => parse_list(&raw),
            Err(_) => SUPPORTED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let image_quality = env::var("IMAGE_QUALITY")
            .unwrap_or_else(|_| DEFAULT_IMAGE_QUALITY.to_string())
            .parse::<u8>()
            .unwrap_or(DEFAULT_IMAGE_QUALITY)
            .clamp(1, 100);

        Ok(Self {
            environment,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| SERVICE_NAME.to_string()),
            database_url: non_empty_var("DATABASE_URL"),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            local_storage_path: non_empty_var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty_var("LOCAL_STORAGE_BASE_URL"),
            s3_bucket: non_empty_var("S3_BUCKET"),
            s3_region: non_empty_var("S3_REGION").or_else(|| non_empty_var("AWS_REGION")),
            s3_endpoint: non_empty_var("S3_ENDPOINT"),
            signed_url_ttl_secs: env::var("SIGNED_URL_TTL_SECS")
                .unwrap_or_else(|_| SIGNED_URL_TTL_SECS.to_string())
                .parse()
                .unwrap_or(SIGNED_URL_TTL_SECS),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_content_types,
            image_quality,
            ffmpeg_path: non_empty_var("FFMPEG_PATH"),
            video_thumbnail_offset_secs: env::var("VIDEO_THUMBNAIL_OFFSET_SECS")
                .unwrap_or_else(|_| VIDEO_THUMBNAIL_OFFSET_SECS.to_string())
                .parse()
                .unwrap_or(VIDEO_THUMBNAIL_OFFSET_SECS),
            task_queue_max_workers: env::var("TASK_QUEUE_MAX_WORKERS")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_WORKERS),
            task_queue_max_retries: env::var("TASK_QUEUE_MAX_RETRIES")
                .unwrap_or_else(|_| TASK_QUEUE_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_MAX_RETRIES),
            task_queue_capacity: env::var("TASK_QUEUE_CAPACITY")
                .unwrap_or_else(|_| TASK_QUEUE_CAPACITY.to_string())
                .parse()
                .unwrap_or(TASK_QUEUE_CAPACITY),
            pending_sweep_limit: env::var("PENDING_SWEEP_LIMIT")
                .unwrap_or_else(|_| PENDING_SWEEP_LIMIT.to_string())
                .parse()
                .unwrap_or(PENDING_SWEEP_LIMIT),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        } else if is_production(&self.environment) {
            return Err(anyhow::anyhow!("DATABASE_URL must be set in production"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if is_production(&self.environment) {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=memory is not allowed in production"
                    ));
                }
            }
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }
        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_CONTENT_TYPES must list at least one content type"
            ));
        }
        if self.task_queue_max_workers == 0 {
            return Err(anyhow::anyhow!(
                "TASK_QUEUE_MAX_WORKERS must be greater than zero"
            ));
        }

        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_production(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

impl Config {
    fn inner(&self) -> &ServiceConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn is_production(&self) -> bool {
        is_production(&self.inner().environment)
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn service_name(&self) -> &str {
        &self.inner().service_name
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn signed_url_ttl_secs(&self) -> u64 {
        self.inner().signed_url_ttl_secs
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.inner().max_file_size_bytes
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.inner().allowed_content_types
    }

    pub fn image_quality(&self) -> u8 {
        self.inner().image_quality
    }

    pub fn ffmpeg_path(&self) -> Option<&str> {
        self.inner().ffmpeg_path.as_deref()
    }

    pub fn video_thumbnail_offset_secs(&self) -> f64 {
        self.inner().video_thumbnail_offset_secs
    }

    pub fn task_queue_max_workers(&self) -> usize {
        self.inner().task_queue_max_workers
    }

    pub fn task_queue_max_retries(&self) -> u32 {
        self.inner().task_queue_max_retries
    }

    pub fn task_queue_capacity(&self) -> usize {
        self.inner().task_queue_capacity
    }

    pub fn pending_sweep_limit(&self) -> i64 {
        self.inner().pending_sweep_limit
    }

    pub fn log_format(&self) -> &str {
        &self.inner().log_format
    }
}

impl From<ServiceConfig> for Config {
    fn from(config: ServiceConfig) -> Self {
        Config(Box::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::from(ServiceConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.image_quality(), 85);
        assert_eq!(config.allowed_content_types().len(), 8);
        assert!(!config.is_production());
    }

    #[test]
    fn test_local_backend_requires_path_and_base_url() {
        let mut inner = ServiceConfig {
            storage_backend: StorageBackend::Local,
            ..ServiceConfig::default()
        };
        let err = inner.validate().unwrap_err();
        assert!(err.to_string().contains("LOCAL_STORAGE_PATH"));

        inner.local_storage_path = Some("/tmp/media".to_string());
        let err = inner.validate().unwrap_err();
        assert!(err.to_string().contains("LOCAL_STORAGE_BASE_URL"));

        inner.local_storage_base_url = Some("http://localhost:4000/media".to_string());
        assert!(inner.validate().is_ok());
    }

    #[test]
    fn test_s3_backend_requires_bucket_and_region() {
        let mut inner = ServiceConfig {
            storage_backend: StorageBackend::S3,
            ..ServiceConfig::default()
        };
        assert!(inner.validate().unwrap_err().to_string().contains("S3_BUCKET"));
        inner.s3_bucket = Some("media".to_string());
        assert!(inner.validate().unwrap_err().to_string().contains("S3_REGION"));
        inner.s3_region = Some("eu-west-1".to_string());
        assert!(inner.validate().is_ok());
    }

    #[test]
    fn test_database_url_must_be_postgres() {
        let inner = ServiceConfig {
            database_url: Some("mysql://localhost/db".to_string()),
            ..ServiceConfig::default()
        };
        assert!(inner.validate().is_err());

        let inner = ServiceConfig {
            database_url: Some("postgres://localhost/media".to_string()),
            ..ServiceConfig::default()
        };
        assert!(inner.validate().is_ok());
    }

    #[test]
    fn test_production_rejects_memory_backends() {
        let inner = ServiceConfig {
            environment: "production".to_string(),
            database_url: Some("postgres://localhost/media".to_string()),
            ..ServiceConfig::default()
        };
        assert!(inner
            .validate()
            .unwrap_err()
            .to_string()
            .contains("STORAGE_BACKEND=memory"));

        let inner = ServiceConfig {
            environment: "prod".to_string(),
            ..ServiceConfig::default()
        };
        assert!(inner.validate().unwrap_err().to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_parse_list_trims_and_lowercases() {
        assert_eq!(
            parse_list(" Image/PNG, ,video/mp4 "),
            vec!["image/png".to_string(), "video/mp4".to_string()]
        );
    }
}
