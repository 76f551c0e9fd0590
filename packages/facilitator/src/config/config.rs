use anyhow::{Result, anyhow};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, str::FromStr};

use crate::{handlers::event::EventKind, services::retry::RetryPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilitatorConfig {
    pub database: DatabaseConfig,
    pub origin: ChainConfig,
    pub auxiliary: ChainConfig,
    #[serde(default)]
    pub facilitator: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// One side of the bridge. `pool_address` is the stake pool on origin and the redeem pool on auxiliary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub private_key: String,
    pub chain_id: u64,
    pub gas_price: u64,
    pub gateway_address: String,
    pub pool_address: String,
    pub anchor_address: String,
    pub token_address: String,
    #[serde(default = "default_bounty")]
    pub bounty: String,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default)]
    pub start_block: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub poll_interval_secs: u64,
    pub max_block_range: u64,
    /// Event kinds to ingest; empty means all of them.
    pub events: Vec<String>,
    pub retry: RetryPolicy,
}

fn default_max_connections() -> u32 {
    10
}

fn default_bounty() -> String {
    "0".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            max_block_range: 1_000,
            events: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|e| anyhow!("Invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| anyhow!("{} must be set", name))
}

fn parse_address(label: &str, value: &str) -> Result<Address> {
    if !value.starts_with("0x") || value.len() != 42 {
        return Err(anyhow!("Invalid {} address: {}", label, value));
    }
    value
        .parse()
        .map_err(|e| anyhow!("Invalid {} address {}: {}", label, value, e))
}

impl FacilitatorConfig {
    pub fn from_file(path: PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        let defaults = RunConfig::default();
        let retry = RetryPolicy::default();

        Ok(FacilitatorConfig {
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: env_or("DB_MAX_CONNECTIONS", default_max_connections())?,
            },
            origin: ChainConfig::from_env("ORIGIN")?,
            auxiliary: ChainConfig::from_env("AUXILIARY")?,
            facilitator: RunConfig {
                poll_interval_secs: env_or("POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
                max_block_range: env_or("MAX_BLOCK_RANGE", defaults.max_block_range)?,
                events: env::var("FACILITATOR_EVENTS")
                    .map(|names| {
                        names
                            .split(',')
                            .map(str::trim)
                            .filter(|name| !name.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
                retry: RetryPolicy {
                    max_attempts: env_or("RETRY_MAX_ATTEMPTS", retry.max_attempts)?,
                    initial_backoff_ms: env_or("RETRY_INITIAL_BACKOFF_MS", retry.initial_backoff_ms)?,
                    max_backoff_ms: env_or("RETRY_MAX_BACKOFF_MS", retry.max_backoff_ms)?,
                },
            },
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(anyhow!("Database URL is empty"));
        }

        self.origin.validate("origin")?;
        self.auxiliary.validate("auxiliary")?;

        if self.origin.chain_id == self.auxiliary.chain_id {
            return Err(anyhow!("Origin and auxiliary chain ids must differ"));
        }

        if self.facilitator.retry.max_attempts == 0 {
            return Err(anyhow!("Retry policy needs at least one attempt"));
        }

        self.event_kinds()?;
        Ok(())
    }

    /// Subscribed event kinds; all kinds when none are configured.
    pub fn event_kinds(&self) -> Result<Vec<EventKind>> {
        if self.facilitator.events.is_empty() {
            return Ok(EventKind::ALL.to_vec());
        }

        self.facilitator
            .events
            .iter()
            .map(|name| {
                name.parse::<EventKind>()
                    .map_err(|e| anyhow!("Invalid facilitator.events entry: {}", e))
            })
            .collect()
    }
}

impl ChainConfig {
    pub fn from_env(prefix: &str) -> Result<Self> {
        let var = |name: &str| format!("{}_{}", prefix, name);

        Ok(ChainConfig {
            rpc_url: required(&var("RPC_URL"))?,
            private_key: required(&var("PRIVATE_KEY"))?,
            chain_id: env_or(&var("CHAIN_ID"), 0)?,
            gas_price: env_or(&var("GAS_PRICE"), 1_000_000_000)?,
            gateway_address: required(&var("GATEWAY_ADDRESS"))?,
            pool_address: required(&var("POOL_ADDRESS"))?,
            anchor_address: required(&var("ANCHOR_ADDRESS"))?,
            token_address: required(&var("TOKEN_ADDRESS"))?,
            bounty: env::var(var("BOUNTY")).unwrap_or_else(|_| default_bounty()),
            confirmations: env_or(&var("CONFIRMATIONS"), 0)?,
            start_block: env_or(&var("START_BLOCK"), 0)?,
        })
    }

    pub fn validate(&self, side: &str) -> Result<()> {
        if !self.rpc_url.starts_with("http") {
            return Err(anyhow!("Invalid {} RPC URL format", side));
        }

        if self.private_key.len() != 64 && self.private_key.len() != 66 {
            return Err(anyhow!("Invalid {} private key length", side));
        }

        if self.chain_id == 0 {
            return Err(anyhow!("{} chain id must be set", side));
        }

        self.gateway()?;
        self.pool()?;
        self.anchor()?;
        self.token()?;
        self.bounty()?;
        Ok(())
    }

    pub fn gateway(&self) -> Result<Address> {
        parse_address("gateway", &self.gateway_address)
    }

    pub fn pool(&self) -> Result<Address> {
        parse_address("pool", &self.pool_address)
    }

    pub fn anchor(&self) -> Result<Address> {
        parse_address("anchor", &self.anchor_address)
    }

    pub fn token(&self) -> Result<Address> {
        parse_address("token", &self.token_address)
    }

    pub fn bounty(&self) -> Result<U256> {
        U256::from_dec_str(&self.bounty).map_err(|e| anyhow!("Invalid bounty: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn set_chain(prefix: &str, chain_id: &str, byte: u8) {
        let address = |offset: u8| format!("0x{}", hex::encode([byte + offset; 20]));
        let vars = [
            ("RPC_URL", "http://localhost:8545".to_string()),
            ("PRIVATE_KEY", KEY.to_string()),
            ("CHAIN_ID", chain_id.to_string()),
            ("GATEWAY_ADDRESS", address(0)),
            ("POOL_ADDRESS", address(1)),
            ("ANCHOR_ADDRESS", address(2)),
            ("TOKEN_ADDRESS", address(3)),
            ("BOUNTY", "100".to_string()),
        ];
        for (name, value) in vars {
            // SAFETY: env-mutating tests are serialized.
            unsafe { env::set_var(format!("{}_{}", prefix, name), value) };
        }
    }

    fn set_env() {
        unsafe {
            env::set_var("DATABASE_URL", "postgres://localhost/facilitator");
            env::set_var("FACILITATOR_EVENTS", "StakeRequested, GatewayProven");
            env::remove_var("RETRY_MAX_ATTEMPTS");
        }
        set_chain("ORIGIN", "1", 0x10);
        set_chain("AUXILIARY", "3", 0x20);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_both_chains() {
        set_env();

        let config = FacilitatorConfig::from_env().unwrap();
        config.validate().unwrap();

        assert_eq!(config.origin.chain_id, 1);
        assert_eq!(config.auxiliary.bounty().unwrap(), U256::from(100));
        assert_eq!(config.origin.gateway().unwrap(), Address::repeat_byte(0x10));
        assert_eq!(
            config.event_kinds().unwrap(),
            vec![EventKind::StakeRequested, EventKind::GatewayProven]
        );
        assert_eq!(config.facilitator.retry, RetryPolicy::default());
    }

    #[test]
    #[serial]
    fn test_unknown_event_kind_is_rejected() {
        set_env();
        unsafe { env::set_var("FACILITATOR_EVENTS", "StakeRequested,Transfer") };

        let config = FacilitatorConfig::from_env().unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_malformed_address_fails_validation() {
        set_env();
        unsafe { env::set_var("AUXILIARY_GATEWAY_ADDRESS", "0x1234") };

        let config = FacilitatorConfig::from_env().unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gateway"));
    }

    #[test]
    fn test_from_file_applies_defaults() {
        let origin = Address::repeat_byte(0x10);
        let auxiliary = Address::repeat_byte(0x20);
        let chain = |chain_id: u64, address: Address| {
            format!(
                "rpc_url = \"http://localhost:8545\"\nprivate_key = \"{KEY}\"\nchain_id = {chain_id}\ngas_price = 1\ngateway_address = \"{address:?}\"\npool_address = \"{address:?}\"\nanchor_address = \"{address:?}\"\ntoken_address = \"{address:?}\"\n"
            )
        };
        let contents = format!(
            "[database]\nurl = \"postgres://localhost/facilitator\"\n\n[origin]\n{}\n[auxiliary]\n{}",
            chain(1, origin),
            chain(3, auxiliary)
        );

        let path = env::temp_dir().join(format!("facilitator-{}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        let config = FacilitatorConfig::from_file(path.clone()).unwrap();
        std::fs::remove_file(path).unwrap();

        config.validate().unwrap();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.facilitator.poll_interval_secs, 10);
        assert_eq!(config.event_kinds().unwrap().len(), EventKind::ALL.len());
        assert_eq!(config.auxiliary.bounty().unwrap(), U256::zero());
    }
}
