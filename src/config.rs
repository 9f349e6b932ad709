//! Configuration management for Margin Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::text::{LineGrouping, Y_TOLERANCE};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub analysis: AnalysisConfig,
    pub text: TextConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    /// Root directory for the `local` provider
    pub local_root: PathBuf,
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Local,
    Minio,
    R2,
    S3,
    B2,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Quota granted to a user on first use
    pub default_quota: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextConfig {
    pub line_tolerance: f64,
    pub grouping: LineGrouping,
    /// Highest page number accepted by text extraction
    pub max_pages: u32,
}

/// Default ceiling for `TEXT_MAX_PAGES`
pub const DEFAULT_MAX_PAGES: u32 = 2000;

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                provider: StorageProvider::Local,
                local_root: PathBuf::from("./data/blobs"),
                endpoint: "http://localhost:9000".to_string(),
                bucket: "margin".to_string(),
                access_key: "admin".to_string(),
                secret_key: "password123".to_string(),
                region: Some("us-east-1".to_string()),
            },
            database: DatabaseConfig {
                url: "sqlite:./margin.db".to_string(),
            },
            analysis: AnalysisConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                max_tokens: 1000,
                default_quota: 10,
            },
            text: TextConfig {
                line_tolerance: Y_TOLERANCE,
                grouping: LineGrouping::Anchored,
                max_pages: DEFAULT_MAX_PAGES,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();

        let provider = match env::var("STORAGE_PROVIDER")
            .unwrap_or_else(|_| "local".to_string())
            .as_str()
        {
            "minio" => StorageProvider::Minio,
            "r2" => StorageProvider::R2,
            "s3" => StorageProvider::S3,
            "b2" => StorageProvider::B2,
            _ => StorageProvider::Local,
        };

        // S3 credentials are only mandatory for the remote providers
        let storage = if provider == StorageProvider::Local {
            StorageConfig {
                provider,
                local_root: env::var("STORAGE_LOCAL_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.local_root),
                ..defaults.storage
            }
        } else {
            StorageConfig {
                provider,
                local_root: defaults.storage.local_root,
                endpoint: env::var("S3_ENDPOINT")?,
                bucket: env::var("S3_BUCKET")?,
                access_key: env::var("S3_ACCESS_KEY")?,
                secret_key: env::var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
            }
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .unwrap_or(3000),
            },
            storage,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            analysis: AnalysisConfig {
                api_key: env::var("OPENAI_API_KEY").ok(),
                base_url: env::var("OPENAI_BASE_URL").unwrap_or(defaults.analysis.base_url),
                model: env::var("OPENAI_MODEL").unwrap_or(defaults.analysis.model),
                max_tokens: env::var("OPENAI_MAX_TOKENS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.analysis.max_tokens),
                default_quota: env::var("AI_DEFAULT_QUOTA")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.analysis.default_quota),
            },
            text: TextConfig {
                line_tolerance: env::var("TEXT_LINE_TOLERANCE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(Y_TOLERANCE),
                grouping: match env::var("TEXT_LINE_GROUPING").as_deref() {
                    Ok("gap") => LineGrouping::GapSplit,
                    _ => LineGrouping::Anchored,
                },
                max_pages: env::var("TEXT_MAX_PAGES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_MAX_PAGES),
            },
        })
    }
}
