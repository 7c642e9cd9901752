//! Environment-driven configuration.
//!
//! `main` loads an optional `.env` file with `dotenvy` first, so every key
//! below can live there or in the process environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::blockchain::{
    ChainOptions, DEFAULT_ADJUST_INTERVAL, DEFAULT_DIFFICULTY, DEFAULT_MAX_RETRIES, DIFF_MAX,
    DIFF_MIN, DifficultyPolicy, MiningMode,
};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    RocksDb,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub store: StoreKind,
    pub chain: ChainOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let store = match get("LEDGER_STORE").as_deref().map(str::trim) {
            None | Some("rocksdb") => StoreKind::RocksDb,
            Some("memory") => StoreKind::Memory,
            Some(other) => return Err(invalid("LEDGER_STORE", other)),
        };
        let mode = match get("LEDGER_MINING_MODE").as_deref().map(str::trim) {
            None | Some("exclusive") => MiningMode::Exclusive,
            Some("optimistic") => MiningMode::Optimistic,
            Some(other) => return Err(invalid("LEDGER_MINING_MODE", other)),
        };

        let policy = DifficultyPolicy {
            interval: parse(&get, "LEDGER_ADJUST_INTERVAL", DEFAULT_ADJUST_INTERVAL)?,
            slow_above_secs: parse(&get, "LEDGER_SLOW_BLOCK_SECS", 2.0)?,
            fast_below_secs: parse(&get, "LEDGER_FAST_BLOCK_SECS", 0.5)?,
            min: DIFF_MIN,
            max: DIFF_MAX,
        };
        for (key, secs) in [
            ("LEDGER_SLOW_BLOCK_SECS", policy.slow_above_secs),
            ("LEDGER_FAST_BLOCK_SECS", policy.fast_below_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(invalid(key, &secs.to_string()));
            }
        }
        if policy.fast_below_secs > policy.slow_above_secs {
            return Err(invalid(
                "LEDGER_FAST_BLOCK_SECS",
                &policy.fast_below_secs.to_string(),
            ));
        }

        let difficulty: i32 = parse(&get, "LEDGER_DIFFICULTY", DEFAULT_DIFFICULTY)?;
        if !(DIFF_MIN..=DIFF_MAX).contains(&difficulty) {
            return Err(invalid("LEDGER_DIFFICULTY", &difficulty.to_string()));
        }

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse(&get, "PORT", 8972)?,
            data_dir: get("LEDGER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            store,
            chain: ChainOptions {
                difficulty,
                policy,
                strict_pow: parse(&get, "LEDGER_STRICT_POW", false)?,
                mode,
                max_retries: parse(&get, "LEDGER_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            },
        })
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&'static str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}
