pub mod error;
pub mod extract;
pub mod routes;

use engine::TradingService;
use std::sync::Arc;

pub use error::ApiError;
pub use extract::{CurrentUser, USER_ID_HEADER};
pub use routes::router;

#[derive(Clone)]
pub struct AppState {
    pub trading: Arc<TradingService>,
}

impl AppState {
    pub fn new(trading: Arc<TradingService>) -> Self {
        Self { trading }
    }
}
