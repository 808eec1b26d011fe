use std::str::FromStr;

use anyhow::Context;
use jsonwebtoken::Algorithm;
use serde::Deserialize;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@admin.com";
pub const DEFAULT_ADMIN_NAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

pub const DEFAULT_TTL_MINUTES: i64 = 30;
/// One year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    /// Parses the configured algorithm name. Only symmetric HMAC schemes are accepted.
    pub fn algorithm(&self) -> anyhow::Result<Algorithm> {
        let alg = Algorithm::from_str(self.algorithm.trim())
            .with_context(|| format!("unknown jwt algorithm `{}`", self.algorithm))?;
        match alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(alg),
            other => anyhow::bail!("jwt algorithm {:?} is not a symmetric scheme", other),
        }
    }
}

/// Account created on startup when it is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            email: DEFAULT_ADMIN_EMAIL.into(),
            name: DEFAULT_ADMIN_NAME.into(),
            password: DEFAULT_ADMIN_PASSWORD.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cors_origins: Vec<String>,
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            algorithm: std::env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES").ok())?,
        };
        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );
        let defaults = BootstrapConfig::default();
        let bootstrap = BootstrapConfig {
            email: std::env::var("BOOTSTRAP_EMAIL").unwrap_or(defaults.email),
            name: std::env::var("BOOTSTRAP_NAME").unwrap_or(defaults.name),
            password: std::env::var("BOOTSTRAP_PASSWORD").unwrap_or(defaults.password),
        };

        let config = Self {
            database_url,
            jwt,
            cors_origins,
            bootstrap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if self.jwt.ttl_minutes <= 0 {
            anyhow::bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be positive");
        }
        if self.jwt.ttl_minutes > MAX_TTL_MINUTES {
            anyhow::bail!(
                "ACCESS_TOKEN_EXPIRE_MINUTES must be at most {}",
                MAX_TTL_MINUTES
            );
        }
        self.jwt.algorithm()?;
        Ok(())
    }
}

/// Falls back to the default only when the variable is unset.
fn parse_ttl_minutes(raw: Option<String>) -> anyhow::Result<i64> {
    match raw {
        None => Ok(DEFAULT_TTL_MINUTES),
        Some(v) => v
            .trim()
            .parse::<i64>()
            .with_context(|| format!("ACCESS_TOKEN_EXPIRE_MINUTES must be an integer, got `{}`", v)),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
