//! Application configuration
//!
//! Read once at startup from the process environment (after `.env` has been
//! loaded by dotenvy).

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::consolidation_type::ConsolidationType;

const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_BIND_ADDR: &str = "BIND_ADDR";
const ENV_CONSOLIDATION_INTERVAL: &str = "CONSOLIDATION_INTERVAL_SECS";
const ENV_DRY_RUN: &str = "CONSOLIDATION_DRY_RUN";
const ENV_MAX_TYPE: &str = "CONSOLIDATION_MAX_TYPE";
const ENV_UPSAMPLE_TYPES: &str = "UPSAMPLE_TYPES";
const ENV_UPSAMPLE_LIMIT: &str = "UPSAMPLE_LIMIT";
const ENV_SCAN_BATCH_SIZE: &str = "SCAN_BATCH_SIZE";
const ENV_RUN_TIMEOUT: &str = "RUN_TIMEOUT_SECS";
const ENV_MAPPING_CACHE_TTL: &str = "MAPPING_CACHE_TTL_SECS";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_CONSOLIDATION_INTERVAL_SECS: u64 = 300;
const DEFAULT_UPSAMPLE_LIMIT: usize = 20;
const DEFAULT_SCAN_BATCH_SIZE: u64 = 1000;
const DEFAULT_RUN_TIMEOUT_SECS: u64 = 600;
const DEFAULT_MAPPING_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub job: JobConfig,
    pub mapping_cache_ttl: Duration,
}

/// Settings of the background consolidation job
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub interval: Duration,
    pub dry_run: bool,
    /// Coarsest granularity the cascade produces
    pub max_type: ConsolidationType,
    /// Granularities whose gaps are filled by interpolation
    pub upsample_types: Vec<ConsolidationType>,
    pub upsample_limit: usize,
    pub scan_batch_size: u64,
    /// Time budget for one mapping per run
    pub run_timeout: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_CONSOLIDATION_INTERVAL_SECS),
            dry_run: false,
            max_type: ConsolidationType::Month,
            upsample_types: Vec::new(),
            upsample_limit: DEFAULT_UPSAMPLE_LIMIT,
            scan_batch_size: DEFAULT_SCAN_BATCH_SIZE,
            run_timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup(ENV_DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_DATABASE_URL))?;

        let bind_addr = lookup(ENV_BIND_ADDR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr.trim().parse().map_err(|_| ConfigError::Invalid {
            name: ENV_BIND_ADDR,
            value: bind_addr.clone(),
        })?;

        let dry_run = match lookup(ENV_DRY_RUN) {
            Some(v) => parse_bool(ENV_DRY_RUN, &v)?,
            None => false,
        };

        let upsample_types = match lookup(ENV_UPSAMPLE_TYPES) {
            Some(v) => parse_type_list(ENV_UPSAMPLE_TYPES, &v)?,
            None => Vec::new(),
        };

        let job = JobConfig {
            interval: Duration::from_secs(parse_or(&lookup, ENV_CONSOLIDATION_INTERVAL, || {
                DEFAULT_CONSOLIDATION_INTERVAL_SECS
            })?),
            dry_run,
            max_type: parse_or(&lookup, ENV_MAX_TYPE, || ConsolidationType::Month)?,
            upsample_types,
            upsample_limit: parse_or(&lookup, ENV_UPSAMPLE_LIMIT, || DEFAULT_UPSAMPLE_LIMIT)?,
            scan_batch_size: parse_or(&lookup, ENV_SCAN_BATCH_SIZE, || DEFAULT_SCAN_BATCH_SIZE)?,
            run_timeout: Duration::from_secs(parse_or(&lookup, ENV_RUN_TIMEOUT, || DEFAULT_RUN_TIMEOUT_SECS)?),
        };

        if job.interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: ENV_CONSOLIDATION_INTERVAL,
                value: "0".to_string(),
            });
        }
        if job.scan_batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_SCAN_BATCH_SIZE,
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            bind_addr,
            job,
            mapping_cache_ttl: Duration::from_secs(parse_or(&lookup, ENV_MAPPING_CACHE_TTL, || {
                DEFAULT_MAPPING_CACHE_TTL_SECS
            })?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: impl FnOnce() -> T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default()),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_type_list(name: &'static str, value: &str) -> Result<Vec<ConsolidationType>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ConsolidationType>().map_err(|_| ConfigError::Invalid {
                name,
                value: s.to_string(),
            })
        })
        .collect()
}
