use core_types::CoreError;
use sqlx::error::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection settings: {0}")]
    ConnectionConfigError(String),

    #[error("Failed to connect to the database: {0}")]
    ConnectionError(#[source] sqlx::Error),

    #[error("Unique constraint `{constraint}` was violated")]
    UniqueViolation { constraint: String },

    #[error("Foreign key constraint `{constraint}` was violated")]
    ForeignKeyViolation { constraint: String },

    #[error("Database query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error(transparent)]
    InvalidInput(#[from] CoreError),

    #[error("Failed to read fixture {path}: {source}")]
    Fixture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse fixture {path}: {source}")]
    FixtureJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Fixture {path} has a non-numeric id key `{key}`")]
    FixtureKey { path: PathBuf, key: String },
}

/// Constraint violations get their own variants so callers can tell a
/// duplicate email apart from a dropped connection.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.kind() {
                ErrorKind::UniqueViolation => return DbError::UniqueViolation { constraint },
                ErrorKind::ForeignKeyViolation => {
                    return DbError::ForeignKeyViolation { constraint };
                }
                _ => {}
            }
        }
        DbError::Query(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_query_errors() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Query(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn core_errors_keep_their_message() {
        let err = DbError::from(CoreError::InvalidInput("limit".into(), "must not be negative".into()));
        assert_eq!(err.to_string(), "Invalid input for limit: must not be negative");
    }
}
