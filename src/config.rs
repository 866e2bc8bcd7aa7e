//! Runtime configuration read from the environment (and `.env`, via dotenvy).
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
const DEFAULT_DATABASE_URL: &str = "sqlite:./crowdfund.sqlite?mode=rwc";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_OTP_TTL_SECS: u64 = 600;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;
const DEFAULT_RATE_LIMIT_PERIOD_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has an invalid value: '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Per-client limit on the OTP endpoints: `burst` requests, one more
/// replenished every `period`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub burst: u32,
    pub period: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub sendgrid_api_key: String,
    pub otp_sender_email: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub otp_ttl: Duration,
    pub http_timeout: Duration,
    pub rate_limit: Option<RateLimit>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(key) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid { var: key, value }),
                None => Ok(default),
            }
        };

        let burst = number("OTP_RATE_LIMIT_BURST", DEFAULT_RATE_LIMIT_BURST as u64)?;
        let burst = u32::try_from(burst).map_err(|_| ConfigError::Invalid {
            var: "OTP_RATE_LIMIT_BURST",
            value: burst.to_string(),
        })?;
        let period_secs = number("OTP_RATE_LIMIT_PERIOD_SECS", DEFAULT_RATE_LIMIT_PERIOD_SECS)?;
        // A zero burst or period switches rate limiting off.
        let rate_limit = (burst > 0 && period_secs > 0).then(|| RateLimit {
            burst,
            period: Duration::from_secs(period_secs),
        });

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            upload_dir: PathBuf::from(
                get("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            sendgrid_api_key: required("SENDGRID_API_KEY")?,
            otp_sender_email: required("OTP_SENDER_EMAIL")?,
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            otp_ttl: Duration::from_secs(number("OTP_TTL_SECS", DEFAULT_OTP_TTL_SECS)?),
            http_timeout: Duration::from_secs(number(
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            rate_limit,
        })
    }
}
