use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub purge_interval_secs: u64,
}

impl SessionConfig {
    /// Longest session lifetime accepted from the environment (one year).
    pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=Self::MAX_TTL_MINUTES).contains(&self.ttl_minutes) {
            anyhow::bail!(
                "SESSION_TTL_MINUTES must be between 1 and {}, got {}",
                Self::MAX_TTL_MINUTES,
                self.ttl_minutes
            );
        }
        if self.purge_interval_secs == 0 {
            anyhow::bail!("SESSION_PURGE_INTERVAL_SECS must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfig {
    pub max_bytes: usize,
    pub url_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub avatar: AvatarConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET").context("SESSION_SECRET is not set")?,
            issuer: env_or("SESSION_ISSUER", "profilehub"),
            audience: env_or("SESSION_AUDIENCE", "profilehub-users"),
            // sessions live two weeks unless told otherwise
            ttl_minutes: parse_or("SESSION_TTL_MINUTES", 60 * 24 * 14),
            purge_interval_secs: parse_or("SESSION_PURGE_INTERVAL_SECS", 60 * 60),
        };
        session.validate()?;
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT is not set")?,
            bucket: env_or("MINIO_BUCKET", "avatars"),
            access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY is not set")?,
            secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY is not set")?,
            region: env_or("MINIO_REGION", "us-east-1"),
        };
        let avatar = AvatarConfig {
            max_bytes: parse_or("AVATAR_MAX_BYTES", 5 * 1024 * 1024),
            url_ttl_secs: parse_or("AVATAR_URL_TTL_SECS", 30 * 60),
        };
        Ok(Self {
            database_url,
            host: env_or("APP_HOST", "0.0.0.0"),
            port: parse_or("APP_PORT", 8080),
            session,
            storage,
            avatar,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// Falls back to `default` when the variable is unset or does not parse.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
