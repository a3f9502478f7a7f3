pub mod account;
pub mod meta;
pub mod trades;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(meta::health_check))
        .route("/version", get(meta::version))
        .route("/api/payouts", get(meta::payout_menu))
        .route("/api/prices", get(meta::market))
        .route("/api/prices/:pair", get(meta::price))
        .route("/api/trades", post(trades::place_trade))
        .route("/api/trades/active", get(trades::active_trades))
        .route("/api/trades/history", get(trades::history))
        .route("/api/trades/results", get(trades::recent_results))
        .route("/api/trades/:id", get(trades::get_trade))
        .route("/api/trades/:id/seen", post(trades::mark_seen))
        .route("/api/trades/:id/settle", post(trades::settle))
        .route("/api/account", post(account::open_account))
        .route("/api/account/balance", get(account::balance))
        .route("/api/account/deposit", post(account::deposit))
        .route("/api/account/withdraw", post(account::withdraw))
        .route("/api/account/transactions", get(account::transactions))
        .route("/api/account/pnl", get(account::pnl))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
