use sqlx::error::ErrorKind;
use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Input document rejected before any statement was executed
    #[error("Invalid input for {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// Unique constraint violation
    #[error("Unique constraint violation")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
        /// The conflicting key that caused the violation (if extractable)
        conflicting_value: Option<String>,
    },

    /// Foreign key constraint violation
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Check constraint violation
    #[error("Check constraint violation")]
    CheckViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// NOT NULL constraint violation
    #[error("Not null constraint violation")]
    NotNullViolation { table: Option<String>, message: String },

    /// Connection could not be acquired or was lost mid-operation. Safe to retry the whole call.
    #[error("Database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        DbError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is transient (store unavailable, deadlock, serialization failure)
    /// rather than a problem with the data itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Unavailable(_))
    }

    /// Whether the failure was a constraint rejecting the write
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::CheckViolation { .. }
                | DbError::NotNullViolation { .. }
        )
    }
}

/// SQLSTATE codes for serialization_failure and deadlock_detected
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().map(|s| s.to_string());
                let table = db_err.table().map(|s| s.to_string());
                let message = db_err.message().to_string();

                match db_err.kind() {
                    ErrorKind::UniqueViolation => {
                        let conflicting_value = db_err
                            .try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
                            .and_then(|pg_err| pg_err.detail())
                            .and_then(|detail| extract_conflicting_key(detail, constraint.as_deref()));

                        DbError::UniqueViolation {
                            constraint,
                            table,
                            message,
                            conflicting_value,
                        }
                    }
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { constraint, table, message },
                    ErrorKind::CheckViolation => DbError::CheckViolation { constraint, table, message },
                    ErrorKind::NotNullViolation => DbError::NotNullViolation { table, message },
                    _ if db_err.code().is_some_and(|code| RETRYABLE_SQLSTATES.iter().any(|c| code == *c)) => {
                        DbError::Unavailable(err)
                    }
                    // All other database errors are non-recoverable - convert to anyhow
                    _ => DbError::Other(anyhow::Error::from(err)),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::WorkerCrashed => {
                DbError::Unavailable(err)
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Extract the conflicting natural key from a PostgreSQL error detail message.
/// Only extracts for the plant natural key indexes so duplicate plants stay visible in logs.
fn extract_conflicting_key(detail: &str, constraint: Option<&str>) -> Option<String> {
    match constraint {
        Some("plants_indoor_natural_key") | Some("plants_outdoor_natural_key") => {
            // PostgreSQL unique violation details typically look like:
            // "Key (plant_name, plant_group)=(Pothos, Houseplants) already exists."
            let start = detail.find("=(")?;
            let end = detail[start + 2..].rfind(')')?;
            Some(detail[start + 2..start + 2 + end].to_string())
        }
        _ => None,
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
