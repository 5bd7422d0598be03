//! # Database Error Types
//!
//! Everything a ledger call can fail with once it reaches the database.
//!
//! ```text
//! sqlx::Error ──┐
//!               ├──► DbError ──► Conflict | Busy ──► Ledger::with_retry
//! CoreError ────┘         └────► anything else ────► caller
//! ```
//!
//! Rule violations keep the `CoreError` message untouched (`#[error(transparent)]`)
//! so the UI can show it as is.

use dulce_core::CoreError;
use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A versioned update matched no row: someone else wrote it first.
    ///
    /// ## When This Occurs
    /// - A sale or transfer updated the row between our read and our write
    /// - The row was read at a version that no longer exists
    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: String, id: String },

    /// The request broke a ledger rule. Nothing was written.
    #[error(transparent)]
    Ledger(#[from] CoreError),

    /// Issuing a row or catalog entry whose id already exists.
    #[error("{field} already exists ({value})")]
    UniqueViolation { field: String, value: String },

    /// A transfer record pointing at a row that is not there.
    #[error("Dangling reference: {message}")]
    ForeignKeyViolation { message: String },

    /// SQLite stayed locked for longer than the busy timeout.
    #[error("Database is busy: {0}")]
    Busy(String),

    /// The ledger file could not be opened or created.
    #[error("Cannot open ledger database: {0}")]
    ConnectionFailed(String),

    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// No pooled connection became free within the acquire timeout.
    #[error("No database connection available")]
    PoolExhausted,

    #[error("Database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Conflict error for a lost optimistic race.
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether re-running the whole operation from a fresh read may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Conflict { .. } | DbError::Busy(_))
    }

    /// The ledger rule that rejected the request, if that is what failed.
    pub fn as_ledger(&self) -> Option<&CoreError> {
        match self {
            DbError::Ledger(err) => Some(err),
            _ => None,
        }
    }
}

/// SQLite primary result codes for a locked database.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Classifies sqlx errors. Constraint kinds come from the driver; lock
/// contention is detected from the (possibly extended) SQLite result code.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();

                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        field: message
                            .rsplit(": ")
                            .next()
                            .unwrap_or("unknown")
                            .to_string(),
                        value: "unknown".to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
                    _ if is_lock_code(db_err.code().as_deref()) => DbError::Busy(message),
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

fn is_lock_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
