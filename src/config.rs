//! Configuration for the gateway
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Ten years, i.e. effectively permanent
const DEFAULT_COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 365 * 10;

/// logbook - activity gateway for Mon journal de bord
#[derive(Parser, Debug, Clone)]
#[command(name = "logbook")]
#[command(about = "Token-gated activity resolution and answer submission gateway")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "logbook")]
    pub mongodb_db: String,

    /// Passphrase for the symmetric cipher covering activity tokens,
    /// subject cookies, and stored answers (required in production).
    /// Rotating it silently invalidates all outstanding tokens and cookies.
    #[arg(long, env = "SECRET_KEY")]
    pub secret_key: Option<String>,

    /// The only token source value this deployment accepts
    #[arg(long, env = "ALLOWED_SOURCE", default_value = "brioeducation")]
    pub allowed_source: String,

    /// Fallback language for profile requests
    #[arg(long, env = "DEFAULT_LANG", default_value = "fr")]
    pub default_lang: String,

    /// Comma-separated list of supported languages
    #[arg(long, env = "SUPPORTED_LANGS", default_value = "fr,en")]
    pub supported_langs: String,

    /// Name of the subject cookie
    #[arg(long, env = "COOKIE_NAME", default_value = "backpackId")]
    pub cookie_name: String,

    /// SameSite attribute for the subject cookie
    #[arg(long, env = "COOKIE_SAME_SITE", default_value = "Lax")]
    pub cookie_same_site: String,

    /// Max-Age of the subject cookie in seconds
    #[arg(long, env = "COOKIE_MAX_AGE_SECS", default_value_t = DEFAULT_COOKIE_MAX_AGE_SECS)]
    pub cookie_max_age_secs: u64,

    /// Comma-separated list of origins allowed on CORS responses
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        default_value = "https://www.monjournaldebord.ca"
    )]
    pub allowed_origins: String,

    /// Enable development mode (optional store, dev-prefixed subject tokens,
    /// default secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// MongoDB connection attempts at startup
    #[arg(long, env = "STORE_CONNECT_RETRIES", default_value = "3")]
    pub store_connect_retries: u32,

    /// Delay between MongoDB connection attempts in milliseconds
    #[arg(long, env = "STORE_RETRY_DELAY_MS", default_value = "1000")]
    pub store_retry_delay_ms: u64,

    /// Requests allowed per rate-limit window
    #[arg(long, env = "RATE_LIMIT_MAX", default_value = "20")]
    pub rate_limit_max: u32,

    /// Rate-limit window in seconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value = "60")]
    pub rate_limit_window_secs: u64,

    /// Maximum history entries per project before resolution blocks
    #[arg(long, env = "HISTORY_PROJECT_LIMIT", default_value = "100")]
    pub history_project_limit: u64,
}

impl Args {
    /// Get effective cipher passphrase (uses default in dev mode)
    pub fn secret_key(&self) -> String {
        if self.dev_mode {
            self.secret_key
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.secret_key
                .clone()
                .expect("SECRET_KEY is required in production mode")
        }
    }

    /// Get the list of allowed CORS origins
    pub fn allowed_origin_list(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Get the list of supported languages
    pub fn supported_lang_list(&self) -> Vec<String> {
        self.supported_langs
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.secret_key.is_none() {
            return Err("SECRET_KEY is required in production mode".to_string());
        }

        if self.rate_limit_window_secs == 0 {
            return Err("RATE_LIMIT_WINDOW_SECS must be greater than zero".to_string());
        }

        if self.supported_lang_list().is_empty() {
            return Err("SUPPORTED_LANGS must list at least one language".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args::parse_from(["logbook", "--dev-mode"])
    }

    #[test]
    fn test_dev_mode_secret_default() {
        let args = args();
        assert_eq!(args.secret_key(), "dev-only-insecure-secret");
    }

    #[test]
    fn test_supported_lang_list() {
        let mut args = args();
        args.supported_langs = "fr, EN ,".to_string();
        assert_eq!(args.supported_lang_list(), vec!["fr", "en"]);
    }

    #[test]
    fn test_validate_requires_secret_in_production() {
        let mut args = args();
        args.dev_mode = false;
        args.secret_key = None;
        assert!(args.validate().is_err());

        args.secret_key = Some("s3cret".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut args = args();
        args.rate_limit_window_secs = 0;
        assert!(args.validate().is_err());
    }
}
