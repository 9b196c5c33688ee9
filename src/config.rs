use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::{
    DEFAULT_BLOCK_CAPACITY, DEFAULT_DIFFICULTY, DEFAULT_MINING_ATTEMPTS, DEFAULT_MINING_REWARD,
    MAX_DIFFICULTY,
};
use crate::error::ConfigError;

/// Consensus parameters fixed for the lifetime of a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Required leading zero hex digits in a block hash.
    pub difficulty: u32,
    pub mining_reward: u64,
    /// Maximum transactions per block, reward included.
    pub block_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            block_capacity: DEFAULT_BLOCK_CAPACITY,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty < 1 {
            return Err(ConfigError::TooSmall {
                name: "DIFFICULTY",
                min: 1,
            });
        }
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::TooLarge {
                name: "DIFFICULTY",
                max: MAX_DIFFICULTY as u64,
            });
        }
        if self.mining_reward < 1 {
            return Err(ConfigError::TooSmall {
                name: "MINING_REWARD",
                min: 1,
            });
        }
        if self.block_capacity < 1 {
            return Err(ConfigError::TooSmall {
                name: "BLOCK_CAPACITY",
                min: 1,
            });
        }
        Ok(())
    }
}

/// Everything the node binary needs, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub ledger: LedgerConfig,
    /// sled database directory; `None` keeps the ledger in memory.
    pub data_dir: Option<PathBuf>,
    pub mining_timeout: Option<Duration>,
    /// How many times a mining request restarts after the tip moved.
    pub mining_max_attempts: u32,
}

impl NodeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            difficulty: parse_or(&lookup, "DIFFICULTY", defaults.difficulty)?,
            mining_reward: parse_or(&lookup, "MINING_REWARD", defaults.mining_reward)?,
            block_capacity: parse_or(&lookup, "BLOCK_CAPACITY", defaults.block_capacity)?,
        };
        ledger.validate()?;

        let mining_max_attempts = parse_or(&lookup, "MINING_MAX_ATTEMPTS", DEFAULT_MINING_ATTEMPTS)?;
        if mining_max_attempts < 1 {
            return Err(ConfigError::TooSmall {
                name: "MINING_MAX_ATTEMPTS",
                min: 1,
            });
        }

        let mining_timeout = match lookup("MINING_TIMEOUT_SECS") {
            Some(raw) => match parse::<u64>("MINING_TIMEOUT_SECS", raw)? {
                0 => {
                    return Err(ConfigError::TooSmall {
                        name: "MINING_TIMEOUT_SECS",
                        min: 1,
                    });
                }
                secs => Some(Duration::from_secs(secs)),
            },
            None => None,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            ledger,
            data_dir: lookup("DATA_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            mining_timeout,
            mining_max_attempts,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => parse(name, raw),
        None => Ok(default),
    }
}

fn parse<T: FromStr>(name: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::NotANumber { name, value: raw })
}
