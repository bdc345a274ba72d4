use crate::domain::{Address, BlockHeight, Decimal};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub rpc_url: String,
    pub tracked_token: Address,
    pub tracked_pool: Address,
    pub position_manager: Address,
    pub pool_registry: Address,
    pub token_decimals: u32,
    pub token_start_block: BlockHeight,
    pub position_manager_start_block: BlockHeight,
    pub pool_start_block: BlockHeight,
    pub token_boost: Decimal,
    pub pool_boost: Decimal,
    /// Always contains the null address and the tracked pool.
    pub excluded_addresses: BTreeSet<Address>,
    pub sweep_interval_secs: u64,
    pub sweep_concurrency: usize,
}

/// Where a balance came from; decides the boost and the start height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointSource {
    /// Direct holdings of the tracked token.
    Token,
    /// Synthetic balance of a liquidity position in the tracked pool.
    Pool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", "8080", "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let rpc_url = env_map
            .get("RPC_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("RPC_URL".to_string()))?;

        let tracked_token = required_address(&env_map, "TRACKED_TOKEN")?;
        let tracked_pool = required_address(&env_map, "TRACKED_POOL")?;
        let position_manager = required_address(&env_map, "POSITION_MANAGER")?;
        let pool_registry = required_address(&env_map, "POOL_REGISTRY")?;

        let token_decimals: u32 =
            parse_or(&env_map, "TOKEN_DECIMALS", "18", "must be a valid u32")?;
        if token_decimals > 28 {
            return Err(ConfigError::InvalidValue(
                "TOKEN_DECIMALS".to_string(),
                "must be at most 28".to_string(),
            ));
        }

        let token_start_block =
            BlockHeight::new(parse_or(&env_map, "TOKEN_START_BLOCK", "0", "must be a valid u64")?);
        let position_manager_start_block = BlockHeight::new(parse_or(
            &env_map,
            "POSITION_MANAGER_START_BLOCK",
            "0",
            "must be a valid u64",
        )?);
        let pool_start_block =
            BlockHeight::new(parse_or(&env_map, "POOL_START_BLOCK", "0", "must be a valid u64")?);

        let token_boost = parse_boost(&env_map, "TOKEN_BOOST", "1")?;
        let pool_boost = parse_boost(&env_map, "POOL_BOOST", "4")?;

        let mut excluded_addresses = BTreeSet::new();
        excluded_addresses.insert(Address::null());
        excluded_addresses.insert(tracked_pool.clone());
        if let Some(list) = env_map.get("EXCLUDED_ADDRESSES") {
            for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let address = Address::from_str(raw).map_err(|e| {
                    ConfigError::InvalidValue("EXCLUDED_ADDRESSES".to_string(), e.to_string())
                })?;
                excluded_addresses.insert(address);
            }
        }

        let sweep_interval_secs: u64 =
            parse_or(&env_map, "SWEEP_INTERVAL_SECS", "3600", "must be a valid u64")?;
        if sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let sweep_concurrency: usize =
            parse_or(&env_map, "SWEEP_CONCURRENCY", "16", "must be a valid usize")?;
        if sweep_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_CONCURRENCY".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            port,
            database_path,
            rpc_url,
            tracked_token,
            tracked_pool,
            position_manager,
            pool_registry,
            token_decimals,
            token_start_block,
            position_manager_start_block,
            pool_start_block,
            token_boost,
            pool_boost,
            excluded_addresses,
            sweep_interval_secs,
            sweep_concurrency,
        })
    }

    pub fn is_excluded(&self, address: &Address) -> bool {
        self.excluded_addresses.contains(address)
    }

    pub fn boost(&self, source: PointSource) -> Decimal {
        match source {
            PointSource::Token => self.token_boost,
            PointSource::Pool => self.pool_boost,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
    message: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), message.to_string()))
}

fn required_address(env_map: &HashMap<String, String>, key: &str) -> Result<Address, ConfigError> {
    let raw = env_map
        .get(key)
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))?;
    Address::from_str(raw).map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn parse_boost(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let boost: Decimal = parse_or(env_map, key, default, "must be a decimal number")?;
    if boost.is_negative() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(boost)
}
