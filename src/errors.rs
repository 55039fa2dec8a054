use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// A source table is missing, empty, or yielded no usable rows. This is
    /// a table-level fault, distinct from a dataset with zero matches.
    NoData(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Resource not found error.
    NotFound(String),
    /// Similarity threshold outside [0, 1].
    InvalidThreshold(f64),
    /// CSV parsing failed at the structural level.
    Csv(csv::Error),
    /// Filesystem error while reading a source table.
    Io(std::io::Error),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NoData(msg) => write!(f, "No data: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::InvalidThreshold(value) => {
                write!(f, "Match threshold {} is outside [0, 1]", value)
            }
            AppError::Csv(e) => write!(f, "CSV error: {}", e),
            AppError::Io(e) => write!(f, "IO error: {}", e),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON
    /// body. Logs errors appropriately based on their severity.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NoData(msg) => {
                tracing::warn!("Source table unusable: {}", msg);
                (StatusCode::UNPROCESSABLE_ENTITY, msg.clone())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidThreshold(value) => (
                StatusCode::BAD_REQUEST,
                format!("Match threshold {} is outside [0, 1]", value),
            ),
            AppError::Csv(e) => {
                tracing::error!("CSV parse failure: {}", e);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Source table could not be parsed".to_string(),
                )
            }
            AppError::Io(e) => {
                tracing::error!("Source table read failure: {}", e);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "Source table could not be read".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                // Log full context chain for debugging
                tracing::error!("Error with context: {} -> {}", context, source);
                // Delegate to underlying error's response
                return source.clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

// Make AppError cloneable for WithContext chains. csv::Error and
// std::io::Error are not cloneable, so those variants degrade to their
// message form.
impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::NoData(msg) => AppError::NoData(msg.clone()),
            AppError::BadRequest(msg) => AppError::BadRequest(msg.clone()),
            AppError::NotFound(msg) => AppError::NotFound(msg.clone()),
            AppError::InvalidThreshold(value) => AppError::InvalidThreshold(*value),
            AppError::Csv(e) => AppError::InternalError(format!("CSV error: {}", e)),
            AppError::Io(e) => AppError::InternalError(format!("IO error: {}", e)),
            AppError::InternalError(msg) => AppError::InternalError(msg.clone()),
            AppError::WithContext { source, context } => AppError::WithContext {
                source: source.clone(),
                context: context.clone(),
            },
        }
    }
}

impl From<csv::Error> for AppError {
    /// Converts a `csv::Error` into an `AppError`.
    fn from(err: csv::Error) -> Self {
        AppError::Csv(err)
    }
}

impl From<std::io::Error> for AppError {
    /// Converts a `std::io::Error` into an `AppError`.
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for std::io::Error to add context
impl<T> ResultExt<T> for Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Io(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::Io(e)),
            context: f(),
        })
    }
}
