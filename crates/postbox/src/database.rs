use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Opens the connection pool and makes sure the server answers.
///
/// This is a single attempt; callers decide what to do when postgres is not
/// up yet.
pub async fn connect(dsn: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(dsn);
    options.connect_timeout(Duration::from_secs(5));

    let database = Database::connect(options).await?;
    database.ping().await?;

    tracing::info!("connected to database");

    Ok(database)
}
