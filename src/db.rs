use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::debug;

/// Pool sizing for the local portal database.
const LOCAL_MAX_CONNECTIONS: u32 = 10;
/// The ERP replica is shared with other consumers; stay modest.
const ERP_MAX_CONNECTIONS: u32 = 5;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(8);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

async fn establish(url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_owned());
    options
        .max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(CONNECT_TIMEOUT)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .sqlx_logging(false);

    debug!(max_connections, "establishing database connection pool");
    Database::connect(options).await
}

/// Pool for the local portal database (projection store).
pub async fn connect_local(url: &str) -> Result<DatabaseConnection, DbErr> {
    establish(url, LOCAL_MAX_CONNECTIONS).await
}

/// Read pool against the ERP replica. Validation happens at checkout; each
/// run takes one connection for its snapshot.
pub async fn connect_erp(url: &str) -> Result<DatabaseConnection, DbErr> {
    establish(url, ERP_MAX_CONNECTIONS).await
}
