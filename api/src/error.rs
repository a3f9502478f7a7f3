use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared::TradeError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or malformed x-user-id header")]
    MissingIdentity,

    #[error(transparent)]
    Trade(#[from] TradeError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingIdentity => StatusCode::UNAUTHORIZED,
            ApiError::Trade(e) => match e {
                TradeError::InvalidStake(_)
                | TradeError::InvalidDuration(_)
                | TradeError::InvalidAmount(_)
                | TradeError::UnknownInstrument(_) => StatusCode::BAD_REQUEST,
                TradeError::InsufficientBalance { .. }
                | TradeError::ActiveTradeExists(_)
                | TradeError::NotYetDue { .. }
                | TradeError::DoubleSettlement(_) => StatusCode::CONFLICT,
                TradeError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                TradeError::TradeNotFound(_) | TradeError::AccountNotFound(_) => StatusCode::NOT_FOUND,
                TradeError::PriceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                TradeError::Database(_) | TradeError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingIdentity => "MissingIdentity",
            ApiError::Trade(e) => e.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(error = %self, "Request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": self.kind(), "message": message }))).into_response()
    }
}
