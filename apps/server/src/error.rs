use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaDetail>,
}

/// A validation failure attached to a single input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Quota state reported alongside a `QuotaExceeded` rejection
#[derive(Debug, Clone, Serialize)]
pub struct QuotaDetail {
    pub count: i32,
    pub limit: i32,
    pub reset_at: DateTime<Utc>,
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Application errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Daily generation quota exceeded ({count}/{limit}), resets at {reset_at}")]
    QuotaExceeded {
        count: i32,
        limit: i32,
        reset_at: DateTime<Utc>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a validation error on a single field
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_type = match self {
            AppError::NotFound(_) => "NotFound",
            AppError::Validation(_) => "ValidationError",
            AppError::QuotaExceeded { .. } => "QuotaExceeded",
            AppError::Conflict(_) => "Conflict",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Database(_) => "DatabaseError",
            AppError::Internal(_) => "InternalError",
        };

        let fields = match self {
            AppError::Validation(fields) => Some(fields.clone()),
            _ => None,
        };

        let quota = match self {
            AppError::QuotaExceeded {
                count,
                limit,
                reset_at,
            } => Some(QuotaDetail {
                count: *count,
                limit: *limit,
                reset_at: *reset_at,
            }),
            _ => None,
        };

        let mut builder = HttpResponse::build(self.status_code());
        if let Some(ref q) = quota {
            let retry_after = (q.reset_at - Utc::now()).num_seconds().max(1);
            builder.insert_header(("Retry-After", retry_after.to_string()));
        }

        let response = ErrorResponse {
            error: ErrorDetail {
                error_type: error_type.to_string(),
                message: self.to_string(),
                fields,
                quota,
            },
        };

        builder.json(response)
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
