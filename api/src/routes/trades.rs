use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use engine::{ActiveTradeView, PlaceTrade};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::Trade;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::AppState;

pub const DEFAULT_LIMIT: u64 = 50;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u64>,
}

impl LimitQuery {
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

pub async fn place_trade(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<PlaceTrade>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let trade = state.trading.place_trade(user_id, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "trade_id": trade.id, "trade": trade })),
    ))
}

pub async fn active_trades(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<ActiveTradeView>>, ApiError> {
    Ok(Json(state.trading.active_trade_views(user_id).await?))
}

pub async fn history(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Trade>>, ApiError> {
    Ok(Json(state.trading.history(user_id, query.limit()).await?))
}

pub async fn recent_results(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<Trade>>, ApiError> {
    Ok(Json(state.trading.recent_results(user_id).await?))
}

pub async fn get_trade(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(trade_id): Path<Uuid>,
) -> Result<Json<Trade>, ApiError> {
    Ok(Json(state.trading.trade(user_id, trade_id).await?))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(trade_id): Path<Uuid>,
) -> Result<Json<Trade>, ApiError> {
    Ok(Json(state.trading.mark_result_seen(user_id, trade_id).await?))
}

/// Settles a due trade immediately instead of waiting for its timer.
pub async fn settle(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(trade_id): Path<Uuid>,
) -> Result<Json<Trade>, ApiError> {
    Ok(Json(state.trading.settle_now(user_id, trade_id).await?))
}
