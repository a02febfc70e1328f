use crate::db::errors::DbError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Request rejected before any work was done
    #[error("{message}")]
    InvalidInput { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// A collaborator (classifier, LLM, image search) failed or returned unusable output
    #[error("{service} failed: {message}")]
    Upstream { service: String, message: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput { message: message.into() }
    }

    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the whole operation could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(db_err) => db_err.is_transient(),
            Error::Upstream { .. } => true,
            _ => false,
        }
    }

    /// Whether the data itself was rejected, by validation or by a table constraint
    pub fn is_invalid_data(&self) -> bool {
        match self {
            Error::InvalidInput { .. } => true,
            Error::Database(db_err) => matches!(db_err, DbError::InvalidInput { .. }) || db_err.is_integrity_violation(),
            _ => false,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidInput { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Upstream { service, .. } => format!("{service} is unavailable, please try again"),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::InvalidInput { field, message } => format!("Invalid {field}: {message}"),
                DbError::UniqueViolation { constraint, .. } => match constraint.as_deref() {
                    Some("plants_indoor_natural_key") | Some("plants_outdoor_natural_key") => {
                        "A plant with this name already exists for this zone or group".to_string()
                    }
                    _ => "Resource already exists".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } | DbError::NotNullViolation { .. } => "Invalid data provided".to_string(),
                DbError::Unavailable(_) => "Database unavailable, please try again".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal error".to_string(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
