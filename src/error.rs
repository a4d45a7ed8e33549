use std::fmt;

#[derive(Debug)]
pub enum AppError {
    // Reference date / grouping key errors
    MissingReferenceDate(String),
    UnsupportedDateFieldType(String),
    InvalidReferenceDate(String),
    // Allocation errors
    AllocationStoreError(String),
    // Schema and pipeline errors
    FieldNotFound(String),
    Validation(String),
    ConfigurationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MissingReferenceDate(msg) => write!(f, "Missing reference date: {}", msg),
            AppError::UnsupportedDateFieldType(msg) => {
                write!(f, "Unsupported date field type: {}", msg)
            }
            AppError::InvalidReferenceDate(msg) => write!(f, "Invalid reference date: {}", msg),
            AppError::AllocationStoreError(msg) => write!(f, "Allocation store error: {}", msg),
            AppError::FieldNotFound(msg) => write!(f, "Field not found: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::AllocationStoreError(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::ConfigurationError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
