// src/api.rs
use crate::config::Config;
use crate::error::{CustomError, QUOTE_UNAVAILABLE};
use crate::models::{Side, TradeOutcome, User};
use crate::quote::{normalize_symbol, QuoteSource};
use crate::view::{render_page, TradeDraft};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const MAX_FORM_BYTES: u64 = 16 * 1024;
const MIN_QUANTITY: u32 = 1;
const MAX_QUANTITY: u32 = 100;

/// Everything the page form submits. Missing fields default to empty.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SessionForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub symbol: String,
    pub quantity: String,
    pub action: String,
    pub intent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Refresh,
    Subscribe,
    Trade,
}

impl Intent {
    fn parse(raw: &str) -> Self {
        match raw {
            "subscribe" => Intent::Subscribe,
            "trade" => Intent::Trade,
            _ => Intent::Refresh,
        }
    }
}

#[derive(Serialize)]
struct QuoteReply {
    symbol: String,
    price: f64,
}

pub fn routes(
    config: Arc<Config>,
    quotes: Arc<dyn QuoteSource>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .and(with_config(config.clone()))
        .and(with_quotes(quotes.clone()))
        .and_then(index_handler);

    let submit = warp::path::end()
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_FORM_BYTES))
        .and(warp::body::form())
        .and(with_config(config))
        .and(with_quotes(quotes.clone()))
        .and_then(submit_handler);

    let quote = warp::path!("quote" / String)
        .and(warp::get())
        .and(with_quotes(quotes))
        .and_then(quote_handler);

    index.or(submit).or(quote).recover(handle_rejection)
}

fn with_config(
    config: Arc<Config>,
) -> impl Filter<Extract = (Arc<Config>,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

fn with_quotes(
    quotes: Arc<dyn QuoteSource>,
) -> impl Filter<Extract = (Arc<dyn QuoteSource>,), Error = Infallible> + Clone {
    warp::any().map(move || quotes.clone())
}

async fn index_handler(
    config: Arc<Config>,
    quotes: Arc<dyn QuoteSource>,
) -> Result<impl Reply, Rejection> {
    submit_handler(SessionForm::default(), config, quotes).await
}

/// Builds a fresh user from the form, applies the requested action and
/// renders the resulting page.
async fn submit_handler(
    form: SessionForm,
    config: Arc<Config>,
    quotes: Arc<dyn QuoteSource>,
) -> Result<impl Reply, Rejection> {
    let mut user = User::new(
        form.name.trim(),
        form.email.trim(),
        form.password.as_str(),
        &config,
    );
    let mut messages = Vec::new();
    let draft = TradeDraft {
        symbol: normalize_symbol(&form.symbol),
        quantity: form.quantity.trim().parse().unwrap_or(MIN_QUANTITY),
        side: form.action.parse().unwrap_or(Side::Buy),
    };

    match Intent::parse(form.intent.trim()) {
        Intent::Refresh => {}
        Intent::Subscribe => {
            let outcome = user.subscribe();
            info!("Subscribe request for {:?}: {:?}", user.email, outcome);
            messages.push(outcome.to_string());
        }
        Intent::Trade if !user.can_trade() => {
            let outcome = TradeOutcome::LimitReached {
                limit: user.free_limit(),
            };
            info!("Trade refused for {:?}: {}", user.email, outcome);
            messages.push(outcome.to_string());
        }
        Intent::Trade => match validate_trade(&form) {
            Ok((side, quantity)) => {
                let outcome = user
                    .execute(quotes.as_ref(), side, &form.symbol, quantity)
                    .await;
                if outcome.is_executed() {
                    info!("Trade executed for {:?}: {}", user.email, outcome);
                } else {
                    info!("Trade refused for {:?}: {}", user.email, outcome);
                }
                messages.push(outcome.to_string());
            }
            Err(message) => {
                info!("Rejected trade form for {:?}: {}", user.email, message);
                messages.push(message);
            }
        },
    }

    let portfolio = user.get_portfolio(quotes.as_ref()).await;
    Ok(warp::reply::html(render_page(
        &user, &portfolio, &draft, &messages,
    )))
}

fn validate_trade(form: &SessionForm) -> Result<(Side, u32), String> {
    let side = form.action.parse::<Side>()?;
    match form.quantity.trim().parse::<u32>() {
        Ok(quantity) if (MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) => Ok((side, quantity)),
        _ => Err(format!(
            "Quantity must be between {} and {}.",
            MIN_QUANTITY, MAX_QUANTITY
        )),
    }
}

async fn quote_handler(
    symbol: String,
    quotes: Arc<dyn QuoteSource>,
) -> Result<impl Reply, Rejection> {
    let symbol = match urlencoding::decode(&symbol) {
        Ok(decoded) => normalize_symbol(&decoded),
        Err(e) => {
            error!("Undecodable quote symbol {:?}: {}", symbol, e);
            return Err(warp::reject::custom(CustomError {
                message: QUOTE_UNAVAILABLE.to_string(),
            }));
        }
    };
    match quotes.price(&symbol).await {
        Ok(price) => {
            info!("Quote served for {}.", symbol);
            Ok(warp::reply::json(&QuoteReply { symbol, price }))
        }
        Err(e) => {
            error!("Failed to fetch quote for {}: {}", symbol, e);
            Err(warp::reject::custom(CustomError {
                message: QUOTE_UNAVAILABLE.to_string(),
            }))
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(e) = err.find::<CustomError>() {
        (StatusCode::BAD_GATEWAY, e.message.clone())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Form too large".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::BAD_REQUEST, "Bad request".to_string())
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&json!({ "message": message })),
        status,
    ))
}
