use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError},
    http::StatusCode,
    HttpRequest, HttpResponse, ResponseError,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request structure: {0}")]
    InvalidRequestStructure(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Invalid operation: {message}")]
    InvalidOperation {
        message: String,
        /// Id of the resource the operation collided with, if any.
        id: Option<String>,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        AppError::InvalidOperation {
            message: message.into(),
            id: None,
        }
    }

    pub fn invalid_operation_on(message: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::InvalidOperation {
            message: message.into(),
            id: Some(id.into()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequestStructure(_) => "invalid-request-structure",
            AppError::UnknownResource(_) => "unknown-resource",
            AppError::InvalidOperation { .. } => "invalid-operation",
            AppError::Forbidden(_) => "forbidden",
            AppError::InvalidCredentials => "invalid-credentials",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidRequestStructure(err.to_string().replace('\n', ", "))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequestStructure(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownResource(_) => StatusCode::NOT_FOUND,
            AppError::InvalidOperation { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            AppError::InvalidRequestStructure(m)
            | AppError::UnknownResource(m)
            | AppError::Forbidden(m) => m.clone(),
            AppError::InvalidOperation { message, .. } => message.clone(),
            AppError::InvalidCredentials => "Invalid credentials".to_string(),
        };

        let mut body = json!({
            "id": self.kind(),
            "message": message,
        });
        if let AppError::InvalidOperation { id: Some(id), .. } = self {
            body["data"] = json!({ "id": id });
        }

        HttpResponse::build(self.status_code()).json(json!({ "error": body }))
    }
}

// Extractor error handlers, so malformed payloads share the error body above.

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::InvalidRequestStructure(err.to_string()).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::InvalidRequestStructure(err.to_string()).into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::InvalidRequestStructure(err.to_string()).into()
}
