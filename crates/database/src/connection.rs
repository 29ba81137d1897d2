use crate::error::DbError;
use configuration::DatabaseSettings;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::time::Duration;

/// Turns the configured settings into sqlx connect options.
///
/// A configured URL takes precedence over the individual fields.
pub fn connect_options(settings: &DatabaseSettings) -> Result<PgConnectOptions, DbError> {
    if let Some(url) = &settings.url {
        return url
            .parse::<PgConnectOptions>()
            .map_err(|e| DbError::ConnectionConfigError(e.to_string()));
    }

    let mut options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .database(&settings.name);
    if let Some(password) = &settings.password {
        options = options.password(password);
    }
    Ok(options)
}

/// Establishes a connection pool to the PostgreSQL database.
///
/// The pool is cheap to clone; hand clones to each repository instead of
/// sharing a global.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, DbError> {
    let options = connect_options(settings)?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect_with(options)
        .await
        .map_err(DbError::ConnectionError)?;

    tracing::info!(
        max_connections = settings.max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}
