//! Error-to-response mapping for every failure rendered to clients

pub mod codes;
pub mod response;
pub mod validation;

pub use codes::ErrorKind;
pub use response::{http_response, ErrorDetail, ErrorResponse, ResponseEnvelope};
pub use validation::{Validate, ValidatedJson, ValidationErrors, ValidationIssue};

use axum::{
    extract::Request,
    http::{
        header::{ALLOW, CONTENT_TYPE},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use tracing::{error, warn};

use crate::metrics::registry::ERROR_RESPONSES_TOTAL;

/// Application error with optional status, code and message overrides
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("application error {code} (status {http_code})")]
pub struct ApplicationError {
    pub http_code: StatusCode,
    pub code: String,
    pub message: Option<String>,
}

impl ApplicationError {
    /// Missing status defaults to 500, missing code to the status number
    pub fn new(
        http_code: Option<StatusCode>,
        code: Option<String>,
        message: Option<String>,
    ) -> Self {
        let http_code = http_code.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = code.unwrap_or_else(|| http_code.as_u16().to_string());
        Self {
            http_code,
            code,
            message,
        }
    }
}

impl Default for ApplicationError {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl From<ErrorKind> for ApplicationError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(
            Some(kind.status_code()),
            Some(kind.code().to_string()),
            Some(kind.message().to_string()),
        )
    }
}

/// Every error a handler can surface
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error("request validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Framework-level failure (unknown route, wrong method, ...)
    #[error("HTTP {0}")]
    Http(StatusCode),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ErrorKind> for AppError {
    fn from(kind: ErrorKind) -> Self {
        Self::Application(kind.into())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Application(e) => e.http_code,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Http(status) => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            Self::Application(e) => {
                ErrorResponse::new(e.http_code, e.code.clone(), e.message.clone())
            }
            Self::Validation(e) => {
                ErrorResponse::new(StatusCode::BAD_REQUEST, "400", Some(e.message()))
            }
            Self::Http(status) => ErrorResponse::from_status(*status),
            Self::Internal(_) => ErrorResponse::unhandled(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Application(e) if e.http_code.is_server_error() => {
                error!(
                    code = %e.code,
                    status = %e.http_code.as_u16(),
                    message = ?e.message,
                    "Application error"
                );
            }
            Self::Application(e) => {
                warn!(
                    code = %e.code,
                    status = %e.http_code.as_u16(),
                    message = ?e.message,
                    "Application error"
                );
            }
            Self::Validation(e) => {
                warn!(issues = e.issues().len(), message = %e, "Request validation failed");
            }
            Self::Http(status) => {
                warn!(status = %status.as_u16(), "HTTP error");
            }
            Self::Internal(e) => {
                error!(error = ?e, "Unhandled error");
            }
        }

        let body = self.to_error_response();
        ERROR_RESPONSES_TOTAL
            .with_label_values(&[&body.error.code, body.status.as_str()])
            .inc();
        body.into_response()
    }
}

/// Fallback for unknown routes
pub async fn route_not_found() -> AppError {
    AppError::Http(StatusCode::NOT_FOUND)
}

/// Wrap bodiless framework error responses (404, 405, ...) in the error envelope
pub async fn framework_error_middleware(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();

    if (status.is_client_error() || status.is_server_error())
        && !response.headers().contains_key(CONTENT_TYPE)
    {
        let allow = response.headers().get(ALLOW).cloned();
        let mut enveloped = AppError::Http(status).into_response();
        if let Some(allow) = allow {
            enveloped.headers_mut().insert(ALLOW, allow);
        }
        return enveloped;
    }

    response
}

/// Panic handler for `CatchPanicLayer`
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    error!(panic = %detail, "Handler panicked");
    ErrorResponse::unhandled().into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_application_error_defaults() {
        let err = ApplicationError::default();
        assert_eq!(err.http_code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "500");
        assert_eq!(err.message, None);
    }

    #[test]
    fn test_application_error_code_follows_status() {
        let err = ApplicationError::new(Some(StatusCode::CONFLICT), None, Some("taken".into()));
        assert_eq!(err.code, "409");
        assert_eq!(err.message.as_deref(), Some("taken"));
    }

    #[tokio::test]
    async fn test_every_error_kind_renders_its_triple() {
        for kind in ErrorKind::ALL {
            let (status, body) = render(kind.into()).await;
            assert_eq!(status, kind.status_code());
            assert_eq!(body["error"]["code"], kind.code());
            assert_eq!(body["error"]["message"], kind.message());
            assert_eq!(body["track_id"], Value::Null);
            assert_eq!(body["ip"], Value::Null);
        }
    }

    #[tokio::test]
    async fn test_default_application_error_response() {
        let (status, body) = render(ApplicationError::default().into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"track_id": null, "ip": null, "error": {"code": "500", "message": null}})
        );
    }

    #[tokio::test]
    async fn test_custom_application_error_rendered_verbatim() {
        let err = ApplicationError::new(
            Some(StatusCode::UNPROCESSABLE_ENTITY),
            Some("E_QUOTA".into()),
            Some("quota exhausted".into()),
        );
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "E_QUOTA");
        assert_eq!(body["error"]["message"], "quota exhausted");
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let err = ValidationErrors::single(["body", "name"], "field required");
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "400");
        assert_eq!(body["error"]["message"], "/'name'/: field required");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let err = anyhow::anyhow!("connection string postgres://secret@db");
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "500");
        assert_eq!(
            body["error"]["message"],
            ErrorKind::DataResponseMalformed.message()
        );
        assert!(!body.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_http_error_uses_status_code() {
        let (status, body) = render(AppError::Http(StatusCode::METHOD_NOT_ALLOWED)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"]["code"], "405");
        assert_eq!(body["error"]["message"], "Method Not Allowed");
    }

    #[test]
    fn test_handle_panic_returns_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
