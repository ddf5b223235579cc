use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub judge_url: String,
    pub judge_timeout_secs: u64,
    pub rate_limit_per_ip: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_entries: usize,
    /// When set, mutating attempt calls past the overall deadline auto-submit.
    pub enforce_deadlines: bool,
    pub log_format: LogFormat,
    /// Seeded administrator account, created at startup when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let log_format = match env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            jwt_ttl_hours: get_env_or("JWT_TTL_HOURS", 24)?,
            judge_url: get_env("JUDGE_URL")?,
            judge_timeout_secs: get_env_or("JUDGE_TIMEOUT_SECS", 10)?,
            rate_limit_per_ip: get_env_or("RATE_LIMIT_PER_IP", 120)?,
            rate_limit_window_secs: get_env_or("RATE_LIMIT_WINDOW_SECS", 60)?,
            rate_limit_max_entries: get_env_or("RATE_LIMIT_MAX_ENTRIES", 10_000)?,
            enforce_deadlines: get_env_or("ENFORCE_DEADLINES", false)?,
            log_format,
            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.trim().is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
