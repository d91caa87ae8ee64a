use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use secrecy::SecretString;

use crate::error::{Error, Result};

/// Debounce gate thresholds.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub stability: Duration,
    pub cooldown: Duration,
    pub loss_grace: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            stability: Duration::from_secs(3),
            cooldown: Duration::from_secs(60),
            loss_grace: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceConfig {
    pub min_work_interval_minutes: i64,
    pub min_confidence: f32,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            min_work_interval_minutes: 30,
            min_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub interval: Duration,
    pub probe_interval: Duration,
    pub max_retry_attempts: u32,
    pub api_url: Option<String>,
    pub api_key: SecretString,
    pub device_name: String,
    pub project_id: Option<i64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            probe_interval: Duration::from_secs(30),
            max_retry_attempts: 3,
            api_url: None,
            api_key: SecretString::from(String::new()),
            device_name: "TrackSite-Device".to_string(),
            project_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub database_url: SecretString,
    pub buffer_path: String,
    pub store_timeout: Duration,
    pub api_token: Option<SecretString>,
    pub log_dir: String,
    pub log_level: String,

    pub gate: GateConfig,
    pub attendance: AttendanceConfig,
    pub sync: SyncConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let project_id = parse_or("PROJECT_ID", 0i64)?;
        let device_name = env::var("DEVICE_NAME").unwrap_or_else(|_| "TrackSite-Device".to_string());

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8090".to_string()),
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            buffer_path: env::var("BUFFER_PATH").unwrap_or_else(|_| "data/local.db".to_string()),
            store_timeout: Duration::from_secs(parse_or("STORE_TIMEOUT_SECONDS", 5u64)?),
            api_token: non_empty_var("API_TOKEN").map(SecretString::from),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            gate: GateConfig {
                stability: seconds("STABILITY_SECONDS", 3.0)?,
                cooldown: seconds("COOLDOWN_SECONDS", 60.0)?,
                loss_grace: seconds("LOSS_GRACE_SECONDS", 1.5)?,
            },
            attendance: AttendanceConfig {
                min_work_interval_minutes: parse_or("MIN_WORK_INTERVAL", 30i64)?,
                min_confidence: parse_or("MIN_CONFIDENCE", 0.0f32)?,
            },
            sync: SyncConfig {
                interval: Duration::from_secs(parse_or("SYNC_INTERVAL", 300u64)?),
                probe_interval: Duration::from_secs(parse_or("PROBE_INTERVAL", 30u64)?),
                max_retry_attempts: parse_or("MAX_RETRY_ATTEMPTS", 3u32)?,
                api_url: non_empty_var("SYNC_API_URL"),
                api_key: SecretString::from(env::var("SYNC_API_KEY").unwrap_or_default()),
                device_name,
                // 0 means the device is not bound to a project
                project_id: (project_id != 0).then_some(project_id),
            },
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn seconds(name: &str, default: f64) -> Result<Duration> {
    let value: f64 = parse_or(name, default)?;
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Config(format!("{name} must be a non-negative number of seconds")))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test touches its own variables so they can run in parallel.

    #[test]
    fn parse_or_falls_back_to_default_when_unset() {
        unsafe {
            env::remove_var("SITE_TEST_UNSET_NUMBER");
        }
        assert_eq!(parse_or("SITE_TEST_UNSET_NUMBER", 42u32).unwrap(), 42);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        unsafe {
            env::set_var("SITE_TEST_BAD_NUMBER", "thirty");
        }
        let err = parse_or("SITE_TEST_BAD_NUMBER", 30i64).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        unsafe {
            env::remove_var("SITE_TEST_BAD_NUMBER");
        }
    }

    #[test]
    fn fractional_seconds_are_accepted() {
        unsafe {
            env::set_var("SITE_TEST_GRACE", "1.5");
        }
        assert_eq!(seconds("SITE_TEST_GRACE", 0.0).unwrap(), Duration::from_millis(1500));
        unsafe {
            env::remove_var("SITE_TEST_GRACE");
        }
    }

    #[test]
    fn negative_seconds_are_a_config_error() {
        unsafe {
            env::set_var("SITE_TEST_NEGATIVE", "-2");
        }
        assert!(seconds("SITE_TEST_NEGATIVE", 0.0).is_err());
        unsafe {
            env::remove_var("SITE_TEST_NEGATIVE");
        }
    }
}
