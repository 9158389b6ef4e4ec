// src/config.rs
use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    /// Trades a non-subscribed user may make.
    pub free_limit: usize,
    pub subscription_fee: f64,
    pub starting_balance: f64,
    pub bind_addr: SocketAddr,
    pub quote_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: "demo".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            free_limit: 100,
            subscription_fee: 10.0,
            starting_balance: 1000.0,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            quote_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Reads settings from the environment, falling back to the defaults for
    /// anything unset. A `.env` file is honoured when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("ALPHAVANTAGE_API_KEY").unwrap_or(defaults.api_key);
        let base_url = lookup("ALPHAVANTAGE_BASE_URL").unwrap_or(defaults.base_url);
        let free_limit = parse_var(&lookup, "FREE_TRADE_LIMIT", defaults.free_limit)?;
        let subscription_fee =
            parse_var(&lookup, "SUBSCRIPTION_FEE", defaults.subscription_fee)?;
        let starting_balance =
            parse_var(&lookup, "STARTING_BALANCE", defaults.starting_balance)?;
        let bind_addr = parse_var(&lookup, "BIND_ADDR", defaults.bind_addr)?;
        let timeout_secs = parse_var(
            &lookup,
            "QUOTE_TIMEOUT_SECS",
            defaults.quote_timeout.as_secs(),
        )?;

        if subscription_fee < 0.0 || starting_balance < 0.0 {
            anyhow::bail!("SUBSCRIPTION_FEE and STARTING_BALANCE must not be negative");
        }

        Ok(Self {
            api_key,
            base_url,
            free_limit,
            subscription_fee,
            starting_balance,
            bind_addr,
            quote_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
