use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{Direction, QUOTE_ASSET};

use crate::error::ApiError;
use crate::AppState;

pub const GIT_HASH: &str = env!("GIT_HASH");
pub const GIT_BRANCH: &str = env!("GIT_BRANCH");
pub const BUILD_TIME: &str = env!("BUILD_TIME");

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": GIT_HASH,
        "git_branch": GIT_BRANCH,
        "build_time": BUILD_TIME,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PayoutQuery {
    pub direction: Option<Direction>,
}

/// Order-form menu. Without a direction both sides are returned.
pub async fn payout_menu(State(state): State<AppState>, Query(query): Query<PayoutQuery>) -> Json<Value> {
    let trading = &state.trading;
    match query.direction {
        Some(direction) => Json(json!({
            "direction": direction,
            "menu": trading.payout_menu(direction),
        })),
        None => Json(json!({
            "buy": trading.payout_menu(Direction::Buy),
            "sell": trading.payout_menu(Direction::Sell),
        })),
    }
}

/// Market list with current prices and, where the feed has them, 24h changes.
pub async fn market(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let coins = state.trading.market().await?;
    Ok(Json(json!({ "quote_asset": QUOTE_ASSET, "coins": coins })))
}

pub async fn price(State(state): State<AppState>, Path(pair): Path<String>) -> Result<Json<Value>, ApiError> {
    let (symbol, price) = state.trading.price(&pair).await?;
    Ok(Json(json!({
        "symbol": symbol,
        "pair": format!("{}-{}", symbol, QUOTE_ASSET),
        "price": price,
    })))
}
