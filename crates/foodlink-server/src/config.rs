use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::warn;

const PLACEHOLDER_SECRET: &str = "dev-secret-change-me";

/// Runtime settings, read from `FOODLINK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl: chrono::Duration,
    pub admin: Option<AdminSeed>,
}

/// Credentials for the admin account created on first start.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("FOODLINK_JWT_SECRET").unwrap_or_else(|| PLACEHOLDER_SECRET.into());
        if jwt_secret == PLACEHOLDER_SECRET {
            warn!("FOODLINK_JWT_SECRET is not set, tokens are signed with the development secret");
        }

        let port = match lookup("FOODLINK_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid FOODLINK_PORT {raw:?}"))?,
            None => 3000,
        };

        let ttl_days: i64 = match lookup("FOODLINK_TOKEN_TTL_DAYS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid FOODLINK_TOKEN_TTL_DAYS {raw:?}"))?,
            None => 30,
        };
        if ttl_days <= 0 {
            bail!("FOODLINK_TOKEN_TTL_DAYS must be positive");
        }

        let admin = match (lookup("FOODLINK_ADMIN_EMAIL"), lookup("FOODLINK_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email: email.trim().to_lowercase(),
                password,
            }),
            (None, None) => None,
            _ => bail!("FOODLINK_ADMIN_EMAIL and FOODLINK_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            jwt_secret,
            db_path: PathBuf::from(lookup("FOODLINK_DB_PATH").unwrap_or_else(|| "foodlink.db".into())),
            host: lookup("FOODLINK_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            token_ttl: chrono::Duration::days(ttl_days),
            admin,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
