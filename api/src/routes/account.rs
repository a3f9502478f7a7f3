use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use engine::PnlSummary;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{Transaction, QUOTE_ASSET};

use super::trades::LimitQuery;
use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OpenAccount {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Deposit {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct Withdraw {
    pub amount: Decimal,
    pub address: String,
}

fn balance_body(balance: Decimal) -> Json<Value> {
    Json(json!({ "balance": balance, "asset": QUOTE_ASSET }))
}

pub async fn open_account(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<OpenAccount>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let balance = state.trading.open_account(user_id, body.username).await?;
    Ok((StatusCode::CREATED, balance_body(balance)))
}

pub async fn balance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    Ok(balance_body(state.trading.balance(user_id).await?))
}

pub async fn deposit(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<Deposit>,
) -> Result<Json<Value>, ApiError> {
    let transaction = state.trading.deposit(user_id, body.amount).await?;
    let balance = state.trading.balance(user_id).await?;
    Ok(Json(json!({ "transaction": transaction, "balance": balance })))
}

pub async fn withdraw(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<Withdraw>,
) -> Result<Json<Value>, ApiError> {
    let transaction = state.trading.withdraw(user_id, body.amount, &body.address).await?;
    let balance = state.trading.balance(user_id).await?;
    Ok(Json(json!({ "transaction": transaction, "balance": balance })))
}

pub async fn transactions(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.trading.transactions(user_id, query.limit()).await?))
}

pub async fn pnl(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<PnlSummary>, ApiError> {
    Ok(Json(state.trading.pnl_summary(user_id).await?))
}
