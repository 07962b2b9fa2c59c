//! Process configuration, read once from the environment at startup.
//! Components receive the pieces they need by value; request-handling code
//! never reads the environment.

use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Defaults applied to caller-supplied MySQL connection parameters.
#[derive(Debug, Clone)]
pub struct MysqlDefaults {
    pub port: u16,
    pub charset: String,
    /// Default statement timeout (seconds) when the request omits `timeout`.
    pub connection_timeout: u64,
}

/// Qianfan image-generation API settings.
#[derive(Debug, Clone)]
pub struct QianfanConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub version: String,
    pub environment: String,
    pub features: Vec<String>,
    pub host: String,
    pub port: u16,
    pub max_content_length: usize,
    pub qianfan: QianfanConfig,
    pub mysql: MysqlDefaults,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            service_name: env_or("SERVICE_NAME", "unified-gateway"),
            version: env_or("VERSION", env!("CARGO_PKG_VERSION")),
            environment: env_or("ENVIRONMENT", "development"),
            features: vec!["image-generation".into(), "mysql-execution".into()],
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 5000)?,
            max_content_length: env_parse("MAX_CONTENT_LENGTH", 16 * 1024 * 1024)?,
            qianfan: QianfanConfig {
                api_key: std::env::var("QIANFAN_API_KEY")
                    .map_err(|_| ConfigError::Missing("QIANFAN_API_KEY"))?,
                base_url: env_or("QIANFAN_BASE_URL", "https://qianfan.baidubce.com/v2"),
                model: env_or("QIANFAN_MODEL", "irag-1.0"),
                timeout_secs: env_parse("QIANFAN_TIMEOUT", 60)?,
                max_retries: env_parse("QIANFAN_MAX_RETRIES", 3)?,
                retry_base_delay_secs: env_parse("QIANFAN_RETRY_BASE_DELAY", 2)?,
            },
            mysql: MysqlDefaults {
                port: env_parse("MYSQL_DEFAULT_PORT", 3306)?,
                charset: env_or("MYSQL_DEFAULT_CHARSET", "utf8mb4"),
                connection_timeout: env_parse("MYSQL_CONNECTION_TIMEOUT", 30)?,
            },
        })
    }
}

fn env_or(var: &'static str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}
