// src/quote.rs
use crate::config::Config;
use crate::error::QuoteError;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
}

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

/// Anything that can price a symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn price(&self, symbol: &str) -> Result<f64, QuoteError>;
}

/// Trims and upper-cases a user supplied ticker.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, QuoteError> {
        let client = Client::builder().timeout(config.quote_timeout).build()?;
        Ok(Self::new(client, &config.base_url, &config.api_key))
    }

    async fn fetch(&self, symbol: &str) -> Result<f64, QuoteError> {
        if symbol.is_empty() {
            return Err(QuoteError::EmptySymbol);
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(QuoteError::Status(response.status()));
        }

        let body = response.json::<GlobalQuoteResponse>().await?;
        let raw = body
            .global_quote
            .and_then(|quote| quote.price)
            .ok_or_else(|| QuoteError::MissingQuote(symbol.to_string()))?;

        match raw.trim().parse::<f64>() {
            Ok(price) if price.is_finite() && price > 0.0 => Ok(price),
            _ => Err(QuoteError::InvalidPrice {
                symbol: symbol.to_string(),
                price: raw,
            }),
        }
    }
}

#[async_trait]
impl QuoteSource for AlphaVantageClient {
    async fn price(&self, symbol: &str) -> Result<f64, QuoteError> {
        let symbol = normalize_symbol(symbol);
        debug!("Fetching GLOBAL_QUOTE for {}", symbol);
        let result = self.fetch(&symbol).await;
        match &result {
            Ok(price) => debug!("{} quoted at {}", symbol, price),
            Err(e) => warn!("Quote lookup for {:?} failed: {}", symbol, e),
        }
        result
    }
}
