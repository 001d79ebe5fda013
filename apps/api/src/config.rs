use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_COMPLETION_URL: &str = "https://api.siliconflow.cn/v1/chat/completions";
pub const DEFAULT_COMPLETION_MODEL: &str = "deepseek-ai/DeepSeek-R1";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Only malformed values fail startup; everything has a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the completion provider. Empty means the upstream
    /// will answer 401, which surfaces through the normal error path.
    pub api_key: String,
    pub completion_url: String,
    pub default_model: String,
    pub extract_temp_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_key: std::env::var("API_KEY").unwrap_or_default(),
            completion_url: env_or("COMPLETION_URL", DEFAULT_COMPLETION_URL),
            default_model: env_or("COMPLETION_MODEL", DEFAULT_COMPLETION_MODEL),
            extract_temp_dir: std::env::var("EXTRACT_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            max_upload_bytes: match std::env::var("MAX_UPLOAD_BYTES") {
                Ok(v) => v
                    .parse::<usize>()
                    .context("MAX_UPLOAD_BYTES must be a byte count")?,
                Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    /// Configuration pointing at an arbitrary upstream, used by handler tests.
    #[cfg(test)]
    pub fn for_tests(completion_url: &str, extract_temp_dir: PathBuf) -> Self {
        Config {
            api_key: "test-key".to_string(),
            completion_url: completion_url.to_string(),
            default_model: DEFAULT_COMPLETION_MODEL.to_string(),
            extract_temp_dir,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
