/// Configuration management for the gateway
///
/// Loads configuration from environment variables with sensible defaults.
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub kafka: KafkaConfig,
    pub s3: S3Config,
    pub upload: UploadConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct KafkaConfig {
    pub brokers: String,
    /// Topic the gateway publishes processing jobs to.
    pub job_topic: String,
    /// Topic the external worker publishes completion events to.
    pub completion_topic: String,
    pub group_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct S3Config {
    pub videos_bucket: String,
    pub previews_bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UploadConfig {
    pub max_file_size_bytes: i64,
}

/// Default upload cap (1 GB).
const DEFAULT_MAX_FILE_SIZE_BYTES: i64 = 1_000_000_000;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("GATEWAY_PORT")
                    .or_else(|_| std::env::var("PORT"))
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
            },
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/vidstream".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
            cache: CacheConfig {
                redis_url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost".to_string()),
            },
            kafka: KafkaConfig {
                brokers: std::env::var("KAFKA_BROKERS")
                    .unwrap_or_else(|_| "localhost:9092".to_string()),
                job_topic: std::env::var("KAFKA_JOB_TOPIC")
                    .unwrap_or_else(|_| "video-process-queue".to_string()),
                completion_topic: std::env::var("KAFKA_COMPLETION_TOPIC")
                    .unwrap_or_else(|_| "video-metadata-queue".to_string()),
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| "vidstream-gateway".to_string()),
            },
            s3: S3Config {
                videos_bucket: std::env::var("S3_VIDEOS_BUCKET")
                    .unwrap_or_else(|_| "videos".to_string()),
                previews_bucket: std::env::var("S3_PREVIEWS_BUCKET")
                    .unwrap_or_else(|_| "previews".to_string()),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
            },
            upload: UploadConfig {
                max_file_size_bytes: std::env::var("UPLOAD_MAX_FILE_SIZE_BYTES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_env().expect("config from empty env");
        assert_eq!(config.s3.videos_bucket, "videos");
        assert_eq!(config.s3.previews_bucket, "previews");
        assert_eq!(config.upload.max_file_size_bytes, 1_000_000_000);
    }
}
