// src/error.rs
use std::fmt;
use thiserror::Error;
use warp::reject::Reject;

/// Message shown to the user for every failed price lookup.
pub const QUOTE_UNAVAILABLE: &str = "Invalid symbol or API error.";

#[derive(Debug)]
pub struct CustomError {
    pub message: String,
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CustomError {}

impl Reject for CustomError {}

/// Why a quote lookup failed. Users only ever see [`QUOTE_UNAVAILABLE`];
/// the variants exist for the logs.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("empty symbol")]
    EmptySymbol,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("no quote returned for {0}")]
    MissingQuote(String),

    #[error("unparseable price {price:?} for {symbol}")]
    InvalidPrice { symbol: String, price: String },
}
