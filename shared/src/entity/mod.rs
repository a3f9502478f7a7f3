pub mod binary_trades;
pub mod transactions;
pub mod users;
