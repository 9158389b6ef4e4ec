// src/models.rs
use crate::config::Config;
use crate::error::QUOTE_UNAVAILABLE;
use crate::quote::{normalize_symbol, QuoteSource};
use chrono::{DateTime, Utc};
use log::info;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("Unknown action: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub quantity: u32,
    pub price: f64,
    pub side: Side,
    pub executed_at: DateTime<Utc>,
}

/// Result of a trade request. `Display` gives the text shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Executed(Trade),
    InsufficientBalance { symbol: String, quantity: u32 },
    InsufficientShares { symbol: String },
    QuoteUnavailable,
    LimitReached { limit: usize },
}

impl TradeOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, TradeOutcome::Executed(_))
    }
}

impl fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeOutcome::Executed(trade) => {
                let verb = match trade.side {
                    Side::Buy => "bought",
                    Side::Sell => "sold",
                };
                write!(
                    f,
                    "You {} {} shares of {} at ${:.2} per share.",
                    verb, trade.quantity, trade.symbol, trade.price
                )
            }
            TradeOutcome::InsufficientBalance { symbol, quantity } => write!(
                f,
                "You do not have enough balance to buy {} shares of {}.",
                quantity, symbol
            ),
            TradeOutcome::InsufficientShares { symbol } => {
                write!(f, "You do not have enough shares of {} to sell.", symbol)
            }
            TradeOutcome::QuoteUnavailable => write!(f, "{}", QUOTE_UNAVAILABLE),
            TradeOutcome::LimitReached { limit } => write!(
                f,
                "You have reached the limit of {} trades for free users. Please subscribe to the service to make more trades.",
                limit
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubscribeOutcome {
    Subscribed,
    InsufficientBalance { fee: f64 },
    AlreadySubscribed,
}

impl fmt::Display for SubscribeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeOutcome::Subscribed => write!(
                f,
                "You have successfully subscribed to the service. You can now make unlimited trades."
            ),
            SubscribeOutcome::InsufficientBalance { fee } => write!(
                f,
                "You do not have enough balance to subscribe to the service. The subscription fee is ${}.",
                fee
            ),
            SubscribeOutcome::AlreadySubscribed => {
                write!(f, "You are already subscribed to the service.")
            }
        }
    }
}

/// Net positions marked to the latest quotes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    pub positions: BTreeMap<String, i64>,
    /// Market value of every priced position.
    pub value: f64,
    /// Realized cash flow plus `value`.
    pub profit: f64,
    /// Held symbols whose quote could not be fetched.
    pub unpriced: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    pub email: String,
    /// Collected by the login form, never checked.
    pub password: String,
    pub balance: f64,
    pub subscribed: bool,
    pub trades: Vec<Trade>,
    free_limit: usize,
    subscription_fee: f64,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        config: &Config,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            balance: config.starting_balance,
            subscribed: false,
            trades: Vec::new(),
            free_limit: config.free_limit,
            subscription_fee: config.subscription_fee,
        }
    }

    pub fn free_limit(&self) -> usize {
        self.free_limit
    }

    pub fn can_trade(&self) -> bool {
        self.subscribed || self.trades.len() < self.free_limit
    }

    pub fn remaining_free_trades(&self) -> usize {
        self.free_limit.saturating_sub(self.trades.len())
    }

    /// Buys minus sells of `symbol` across every recorded trade.
    pub fn position(&self, symbol: &str) -> i64 {
        let symbol = normalize_symbol(symbol);
        self.trades
            .iter()
            .filter(|trade| trade.symbol == symbol)
            .map(|trade| match trade.side {
                Side::Buy => i64::from(trade.quantity),
                Side::Sell => -i64::from(trade.quantity),
            })
            .sum()
    }

    /// Runs a trade through the free-tier gate, then buys or sells.
    pub async fn execute(
        &mut self,
        quotes: &dyn QuoteSource,
        side: Side,
        symbol: &str,
        quantity: u32,
    ) -> TradeOutcome {
        if !self.can_trade() {
            info!("{} blocked at the free trade limit", self.email);
            return TradeOutcome::LimitReached {
                limit: self.free_limit,
            };
        }
        match side {
            Side::Buy => self.buy_stock(quotes, symbol, quantity).await,
            Side::Sell => self.sell_stock(quotes, symbol, quantity).await,
        }
    }

    pub async fn buy_stock(
        &mut self,
        quotes: &dyn QuoteSource,
        symbol: &str,
        quantity: u32,
    ) -> TradeOutcome {
        let symbol = normalize_symbol(symbol);
        let price = match quotes.price(&symbol).await {
            Ok(price) => price,
            Err(_) => return TradeOutcome::QuoteUnavailable,
        };

        let cost = price * f64::from(quantity);
        if cost > self.balance {
            return TradeOutcome::InsufficientBalance { symbol, quantity };
        }

        self.balance -= cost;
        TradeOutcome::Executed(self.record(symbol, quantity, price, Side::Buy))
    }

    pub async fn sell_stock(
        &mut self,
        quotes: &dyn QuoteSource,
        symbol: &str,
        quantity: u32,
    ) -> TradeOutcome {
        let symbol = normalize_symbol(symbol);
        let price = match quotes.price(&symbol).await {
            Ok(price) => price,
            Err(_) => return TradeOutcome::QuoteUnavailable,
        };

        if i64::from(quantity) > self.position(&symbol) {
            return TradeOutcome::InsufficientShares { symbol };
        }

        self.balance += price * f64::from(quantity);
        TradeOutcome::Executed(self.record(symbol, quantity, price, Side::Sell))
    }

    fn record(&mut self, symbol: String, quantity: u32, price: f64, side: Side) -> Trade {
        let trade = Trade {
            symbol,
            quantity,
            price,
            side,
            executed_at: Utc::now(),
        };
        info!(
            "{} {} {} x {} at {:.2}",
            self.email, trade.side, trade.quantity, trade.symbol, trade.price
        );
        self.trades.push(trade.clone());
        trade
    }

    /// Replays the trade log into net positions, then marks every non-zero
    /// position to a fresh quote.
    pub async fn get_portfolio(&self, quotes: &dyn QuoteSource) -> Portfolio {
        let mut portfolio = Portfolio::default();
        let mut cash_flow = 0.0;

        for trade in &self.trades {
            let notional = trade.price * f64::from(trade.quantity);
            let entry = portfolio.positions.entry(trade.symbol.clone()).or_insert(0);
            match trade.side {
                Side::Buy => {
                    *entry += i64::from(trade.quantity);
                    cash_flow -= notional;
                }
                Side::Sell => {
                    *entry -= i64::from(trade.quantity);
                    cash_flow += notional;
                }
            }
        }

        for (symbol, &quantity) in &portfolio.positions {
            if quantity == 0 {
                continue;
            }
            match quotes.price(symbol).await {
                Ok(price) => portfolio.value += price * quantity as f64,
                Err(_) => portfolio.unpriced.push(symbol.clone()),
            }
        }

        portfolio.profit = cash_flow + portfolio.value;
        portfolio
    }

    pub fn subscribe(&mut self) -> SubscribeOutcome {
        if self.subscribed {
            return SubscribeOutcome::AlreadySubscribed;
        }
        if self.balance < self.subscription_fee {
            return SubscribeOutcome::InsufficientBalance {
                fee: self.subscription_fee,
            };
        }
        self.balance -= self.subscription_fee;
        self.subscribed = true;
        info!("{} subscribed", self.email);
        SubscribeOutcome::Subscribed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::tests::StaticQuotes;

    fn user() -> User {
        User::new("Ada", "ada@example.com", "hunter2", &Config::default())
    }

    fn user_with(config: Config) -> User {
        User::new("Ada", "ada@example.com", "hunter2", &config)
    }

    #[tokio::test]
    async fn buy_then_sell_moves_cash_and_position() {
        let quotes = StaticQuotes::with(&[("ACME", 50.0)]);
        let mut user = user();

        let bought = user.buy_stock(&quotes, "ACME", 2).await;
        assert_eq!(
            bought.to_string(),
            "You bought 2 shares of ACME at $50.00 per share."
        );
        assert_eq!(user.balance, 900.0);
        assert_eq!(user.trades.len(), 1);
        assert_eq!(user.trades[0].symbol, "ACME");
        assert_eq!(user.trades[0].quantity, 2);
        assert_eq!(user.trades[0].price, 50.0);
        assert_eq!(user.trades[0].side, Side::Buy);
        assert_eq!(user.position("ACME"), 2);

        quotes.set("ACME", 60.0);
        let sold = user.sell_stock(&quotes, "acme", 1).await;
        assert_eq!(
            sold.to_string(),
            "You sold 1 shares of ACME at $60.00 per share."
        );
        assert_eq!(user.balance, 960.0);
        assert_eq!(user.position("ACME"), 1);
        assert_eq!(user.trades[1].side, Side::Sell);
    }

    #[tokio::test]
    async fn buy_exactly_the_balance_is_allowed() {
        let quotes = StaticQuotes::with(&[("ACME", 250.0)]);
        let mut user = user();
        assert!(user.buy_stock(&quotes, "ACME", 4).await.is_executed());
        assert_eq!(user.balance, 0.0);
    }

    #[tokio::test]
    async fn buy_beyond_balance_is_rejected_untouched() {
        let quotes = StaticQuotes::with(&[("ACME", 600.0)]);
        let mut user = user();
        let outcome = user.buy_stock(&quotes, "ACME", 2).await;
        assert_eq!(
            outcome.to_string(),
            "You do not have enough balance to buy 2 shares of ACME."
        );
        assert_eq!(user.balance, 1000.0);
        assert!(user.trades.is_empty());
    }

    #[tokio::test]
    async fn selling_more_than_held_is_rejected() {
        let quotes = StaticQuotes::with(&[("ACME", 10.0)]);
        let mut user = user();
        user.buy_stock(&quotes, "ACME", 3).await;

        let outcome = user.sell_stock(&quotes, "ACME", 4).await;
        assert_eq!(
            outcome.to_string(),
            "You do not have enough shares of ACME to sell."
        );
        assert_eq!(user.balance, 970.0);
        assert_eq!(user.trades.len(), 1);

        assert!(user.sell_stock(&quotes, "ACME", 3).await.is_executed());
        assert_eq!(user.position("ACME"), 0);
    }

    #[tokio::test]
    async fn quote_failure_leaves_state_alone() {
        let quotes = StaticQuotes::default();
        let mut user = user();
        let outcome = user.buy_stock(&quotes, "ZZZZ", 1).await;
        assert_eq!(outcome, TradeOutcome::QuoteUnavailable);
        assert_eq!(outcome.to_string(), "Invalid symbol or API error.");
        assert_eq!(user.sell_stock(&quotes, "ZZZZ", 1).await, TradeOutcome::QuoteUnavailable);
        assert_eq!(user.balance, 1000.0);
        assert!(user.trades.is_empty());
    }

    #[tokio::test]
    async fn position_is_buys_minus_sells_per_symbol() {
        let quotes = StaticQuotes::with(&[("AAA", 1.0), ("BBB", 2.0)]);
        let mut user = user();
        user.buy_stock(&quotes, "AAA", 5).await;
        user.buy_stock(&quotes, "BBB", 7).await;
        user.sell_stock(&quotes, "AAA", 2).await;
        user.buy_stock(&quotes, "AAA", 1).await;
        user.sell_stock(&quotes, "BBB", 7).await;

        assert_eq!(user.position("AAA"), 4);
        assert_eq!(user.position("BBB"), 0);
        assert_eq!(user.position("CCC"), 0);
    }

    #[tokio::test]
    async fn portfolio_marks_positions_to_market() {
        let quotes = StaticQuotes::with(&[("ACME", 50.0), ("INIT", 20.0)]);
        let mut user = user();
        user.buy_stock(&quotes, "ACME", 2).await;
        user.buy_stock(&quotes, "INIT", 1).await;
        user.sell_stock(&quotes, "INIT", 1).await;
        quotes.set("ACME", 60.0);

        let portfolio = user.get_portfolio(&quotes).await;
        assert_eq!(portfolio.positions.get("ACME"), Some(&2));
        assert_eq!(portfolio.positions.get("INIT"), Some(&0));
        assert_eq!(portfolio.value, 120.0);
        assert_eq!(portfolio.profit, 20.0);
        assert!(portfolio.unpriced.is_empty());
    }

    #[tokio::test]
    async fn portfolio_prices_each_held_symbol_once() {
        let quotes = StaticQuotes::with(&[("ACME", 50.0), ("FLAT", 5.0)]);
        let mut user = user();
        user.buy_stock(&quotes, "ACME", 1).await;
        user.buy_stock(&quotes, "ACME", 1).await;
        user.buy_stock(&quotes, "FLAT", 1).await;
        user.sell_stock(&quotes, "FLAT", 1).await;
        let before = quotes.calls().len();

        user.get_portfolio(&quotes).await;
        assert_eq!(quotes.calls()[before..].to_vec(), vec!["ACME".to_string()]);
    }

    #[tokio::test]
    async fn unpriced_symbols_are_reported() {
        let quotes = StaticQuotes::with(&[("GONE", 10.0)]);
        let mut user = user();
        user.buy_stock(&quotes, "GONE", 3).await;

        let offline = StaticQuotes::default();
        let portfolio = user.get_portfolio(&offline).await;
        assert_eq!(portfolio.positions.get("GONE"), Some(&3));
        assert_eq!(portfolio.value, 0.0);
        assert_eq!(portfolio.profit, -30.0);
        assert_eq!(portfolio.unpriced, vec!["GONE".to_string()]);
    }

    #[test]
    fn subscribe_charges_once() {
        let mut user = user();
        assert_eq!(user.subscribe(), SubscribeOutcome::Subscribed);
        assert!(user.subscribed);
        assert_eq!(user.balance, 990.0);

        assert_eq!(user.subscribe(), SubscribeOutcome::AlreadySubscribed);
        assert_eq!(
            user.subscribe().to_string(),
            "You are already subscribed to the service."
        );
        assert_eq!(user.balance, 990.0);
    }

    #[test]
    fn subscribe_needs_the_fee() {
        let mut user = user_with(Config {
            starting_balance: 5.0,
            ..Config::default()
        });
        let outcome = user.subscribe();
        assert_eq!(
            outcome.to_string(),
            "You do not have enough balance to subscribe to the service. The subscription fee is $10."
        );
        assert!(!user.subscribed);
        assert_eq!(user.balance, 5.0);
    }

    #[tokio::test]
    async fn free_limit_blocks_until_subscribed() {
        let quotes = StaticQuotes::with(&[("ACME", 1.0)]);
        let mut user = user_with(Config {
            free_limit: 2,
            ..Config::default()
        });
        assert_eq!(user.remaining_free_trades(), 2);
        assert!(user.execute(&quotes, Side::Buy, "ACME", 1).await.is_executed());
        assert!(user.execute(&quotes, Side::Buy, "ACME", 1).await.is_executed());
        assert_eq!(user.remaining_free_trades(), 0);
        assert!(!user.can_trade());

        let blocked = user.execute(&quotes, Side::Sell, "ACME", 1).await;
        assert_eq!(blocked, TradeOutcome::LimitReached { limit: 2 });
        assert!(blocked.to_string().starts_with("You have reached the limit of 2 trades"));
        assert_eq!(user.trades.len(), 2);

        user.subscribe();
        assert!(user.can_trade());
        assert!(user.execute(&quotes, Side::Sell, "ACME", 1).await.is_executed());
    }

    #[test]
    fn side_parses_form_values() {
        assert_eq!("Buy".parse::<Side>(), Ok(Side::Buy));
        assert_eq!(" sell ".parse::<Side>(), Ok(Side::Sell));
        assert!("hold".parse::<Side>().is_err());
    }
}
