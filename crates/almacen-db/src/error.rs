//! # Database Error Types
//!
//! ## Error Flow
//! ```text
//! sqlite error (sqlx::Error)
//!      │
//!      ▼
//! DbError (this module)  ← adds context and categorization
//!      │
//!      ▼
//! SyncError (almacen-sync) / caller
//! ```
//!
//! `InsufficientStock` and `Validation` are *expected* failures: the checkout
//! transaction aborts cleanly and the UI lets the cashier adjust the draft.
//! Everything else is an unexpected store failure.

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: i64 },

    /// Conditional stock decrement did not apply: the product exists but
    /// its quantity is below the requested amount.
    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock { product_id: i64, requested: i64 },

    /// Draft failed validation before the transaction was opened.
    #[error(transparent)]
    Validation(#[from] almacen_core::ValidationError),

    /// Unique constraint violation (duplicate code/barcode, outbox pair).
    #[error("Duplicate {field}: already exists")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and id.
    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// True for the expected, user-correctable failures of a checkout.
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            DbError::InsufficientStock { .. } | DbError::Validation(_) | DbError::NotFound { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound   → DbError::NotFound (id unknown at this level)
/// sqlx::Error::Database      → analyze message for constraint type
/// sqlx::Error::PoolTimedOut  → DbError::PoolExhausted
/// other                      → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: 0,
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { field }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
