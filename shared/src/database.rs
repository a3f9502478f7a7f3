use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

pub async fn get_db_connection(database_url: &str) -> Result<DatabaseConnection> {
    info!("Connecting to database via Sea-ORM at: {}", redact(database_url));
    let mut options = ConnectOptions::new(database_url.to_owned());
    options
        .max_connections(32)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    Ok(db)
}

/// Strips the password out of a connection url before it is logged.
fn redact(database_url: &str) -> String {
    match (database_url.find("://"), database_url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &database_url[scheme_end + 3..at];
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{}{}:***{}", &database_url[..scheme_end + 3], user, &database_url[at..])
        }
        _ => database_url.to_string(),
    }
}
