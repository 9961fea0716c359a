use std::{env, str::FromStr};

use anyhow::{Context, Result, bail};
use dotenvy::dotenv;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub server_addr: String,

    // Session cookie
    pub session_secret: String,
    pub session_ttl: usize,
    pub secure_cookies: bool,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    // Logging
    pub log_dir: String,
    pub log_level: String,

    /// First admin, created only while the users table is empty.
    pub bootstrap_admin: Option<(String, String)>,
}

const MIN_SECRET_LEN: usize = 32;

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let session_secret = required("SESSION_SECRET")?;
        if session_secret.len() < MIN_SECRET_LEN {
            bail!("SESSION_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }

        let rate_login_per_min = parsed_or("RATE_LOGIN_PER_MIN", 20)?;
        let rate_protected_per_min = parsed_or("RATE_PROTECTED_PER_MIN", 1000)?;
        if rate_login_per_min == 0 || rate_protected_per_min == 0 {
            bail!("rate limits must be greater than zero");
        }

        let bootstrap_admin = match (
            env::var("BOOTSTRAP_ADMIN_USERNAME"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(user), Ok(pass)) if !user.trim().is_empty() && !pass.is_empty() => {
                Some((user.trim().to_string(), pass))
            }
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parsed_or("DB_MAX_CONNECTIONS", 10)?,
            session_secret,
            session_ttl: parsed_or("SESSION_TTL", 43_200)?, // 12h
            secure_cookies: parsed_or("SECURE_COOKIES", false)?,
            rate_login_per_min,
            rate_protected_per_min,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            bootstrap_admin,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://unused".into(),
            db_max_connections: 1,
            server_addr: "127.0.0.1:0".into(),
            session_secret: "test-secret-test-secret-test-secret".into(),
            session_ttl: 600,
            secure_cookies: false,
            rate_login_per_min: 60,
            rate_protected_per_min: 1000,
            log_dir: "logs".into(),
            log_level: "debug".into(),
            bootstrap_admin: None,
        }
    }
}
