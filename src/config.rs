// src/config.rs

//! Loads and validates the proxy's configuration from environment variables.
//! There is no config file: every external interface is enumerated by
//! an env var with a documented default.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// One of the `CACHE_STORE` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStoreKind {
    Null,
    Memory,
    File,
}

impl CacheStoreKind {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "null" => Ok(Self::Null),
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            other => Err(anyhow!("unknown CACHE_STORE '{other}' (expected null, memory, or file)")),
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Memory => "memory",
            Self::File => "file",
        }
    }
}

/// The fully resolved, validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub sparql_backend: String,
    pub max_concurrency: u64,
    pub max_waiting: u64,
    pub admin_user: String,
    pub admin_password: String,
    pub admin_cookie_secret: String,
    pub cache_store: CacheStoreKind,
    pub cache_store_path: PathBuf,
    pub compressor: String,
    pub job_timeout: Duration,
    pub duration_to_keep_old_jobs: Duration,
    pub enable_query_splitting: bool,
    pub max_chunk_limit: u64,
    pub max_limit: u64,
    pub trust_proxy: bool,
    pub query_log_path: Option<PathBuf>,
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(v) => v.parse::<u64>().with_context(|| format!("{key} must be a non-negative integer, got '{v}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Reads every known environment variable, applying defaults for anything
    /// unset, and validates the result.
    pub fn from_env() -> Result<Self> {
        let sparql_backend = std::env::var("SPARQL_BACKEND")
            .context("SPARQL_BACKEND is required and was not set")?;

        let config = Self {
            port: env_string("PORT", "3000")
                .parse()
                .context("PORT must be a valid TCP port number")?,
            sparql_backend,
            max_concurrency: env_u64("MAX_CONCURRENCY", 1)?,
            max_waiting: env_u64("MAX_WAITING", u64::MAX)?,
            admin_user: env_string("ADMIN_USER", "admin"),
            admin_password: env_string("ADMIN_PASSWORD", "password"),
            admin_cookie_secret: std::env::var("ADMIN_COOKIE_SECRET").unwrap_or_else(|_| {
                // No dedicated secret configured: derive one from the admin
                // password rather than falling back to a hard-coded value.
                format!("sparql-proxy-admin-cookie.{}", env_string("ADMIN_PASSWORD", "password"))
            }),
            cache_store: CacheStoreKind::parse(&env_string("CACHE_STORE", "null"))?,
            cache_store_path: PathBuf::from(env_string("CACHE_STORE_PATH", "/tmp/sparql-proxy/cache")),
            compressor: env_string("COMPRESSOR", "raw"),
            job_timeout: Duration::from_millis(env_u64("JOB_TIMEOUT", 300_000)?),
            duration_to_keep_old_jobs: Duration::from_millis(env_u64("DURATION_TO_KEEP_OLD_JOBS", 300_000)?),
            enable_query_splitting: env_bool("ENABLE_QUERY_SPLITTING", false),
            max_chunk_limit: env_u64("MAX_CHUNK_LIMIT", 1000)?,
            max_limit: env_u64("MAX_LIMIT", 10_000)?,
            trust_proxy: env_bool("TRUST_PROXY", false),
            query_log_path: std::env::var("QUERY_LOG_PATH").ok().map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("PORT cannot be 0"));
        }
        if self.sparql_backend.trim().is_empty() {
            return Err(anyhow!("SPARQL_BACKEND cannot be empty"));
        }
        if self.max_concurrency == 0 {
            return Err(anyhow!("MAX_CONCURRENCY cannot be 0"));
        }
        if self.max_chunk_limit == 0 {
            return Err(anyhow!("MAX_CHUNK_LIMIT cannot be 0"));
        }
        if self.max_limit == 0 {
            return Err(anyhow!("MAX_LIMIT cannot be 0"));
        }
        if self.max_chunk_limit > self.max_limit {
            return Err(anyhow!(
                "MAX_CHUNK_LIMIT ({}) cannot exceed MAX_LIMIT ({})",
                self.max_chunk_limit,
                self.max_limit
            ));
        }
        crate::core::compressor::from_name(&self.compressor)
            .with_context(|| format!("invalid COMPRESSOR '{}'", self.compressor))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_cache_store_name_is_rejected() {
        assert!(CacheStoreKind::parse("redis").is_err());
    }

    #[test]
    fn known_cache_store_names_round_trip_through_as_name() {
        for (name, kind) in [
            ("null", CacheStoreKind::Null),
            ("memory", CacheStoreKind::Memory),
            ("file", CacheStoreKind::File),
        ] {
            assert_eq!(CacheStoreKind::parse(name).unwrap().as_name(), kind.as_name());
        }
    }

    fn valid_config() -> Config {
        Config {
            port: 3000,
            sparql_backend: "http://backend.example/sparql".to_string(),
            max_concurrency: 1,
            max_waiting: 10,
            admin_user: "admin".to_string(),
            admin_password: "password".to_string(),
            admin_cookie_secret: "secret".to_string(),
            cache_store: CacheStoreKind::Null,
            cache_store_path: PathBuf::new(),
            compressor: "raw".to_string(),
            job_timeout: Duration::from_millis(300_000),
            duration_to_keep_old_jobs: Duration::from_millis(300_000),
            enable_query_splitting: false,
            max_chunk_limit: 1000,
            max_limit: 10_000,
            trust_proxy: false,
            query_log_path: None,
        }
    }

    #[test]
    fn rejects_max_chunk_limit_exceeding_max_limit() {
        let config = Config {
            max_chunk_limit: 2000,
            max_limit: 1000,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_max_chunk_limit_equal_to_max_limit() {
        let config = Config {
            max_chunk_limit: 1000,
            max_limit: 1000,
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }
}
