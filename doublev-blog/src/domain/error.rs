use thiserror::Error;

/// Low-level failures raised by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    Database(String),

    #[error("Unknown column \"{column}\" in table \"{table}\"")]
    UnknownColumn { table: String, column: String },

    #[error("Invalid value for column \"{column}\": {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("{0}")]
    Validation(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Database(format!("Row conversion failed: {}", err))
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PersistenceFailed(String),

    #[error("{0}")]
    DeleteFailed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: you don't have permission to perform this action")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    pub fn to_status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::ValidationError(_) | Self::PersistenceFailed(_) | Self::DeleteFailed(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden => 403,
            Self::Storage(StorageError::UnknownColumn { .. })
            | Self::Storage(StorageError::InvalidValue { .. })
            | Self::Storage(StorageError::Validation(_)) => 400,
            Self::Storage(StorageError::Database(_)) | Self::InternalError(_) => 500,
        }
    }

    /// True for the three repository-level failures an admin action reports back to the user.
    pub fn is_localized(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::PersistenceFailed(_) | Self::DeleteFailed(_)
        )
    }
}
