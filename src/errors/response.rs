use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::codes::ErrorKind;

/// Success envelope: `{track_id, ip, data}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEnvelope<T> {
    /// Caller-supplied correlation id
    pub track_id: Option<String>,
    /// Caller-supplied client address
    pub ip: Option<String>,
    pub data: T,
}

impl<T: Serialize> ResponseEnvelope<T> {
    pub fn new(data: T, track_id: Option<String>, ip: Option<String>) -> Self {
        Self { track_id, ip, data }
    }
}

impl ResponseEnvelope<Value> {
    /// Envelope with an empty object as data
    pub fn empty(track_id: Option<String>, ip: Option<String>) -> Self {
        Self::new(json!({}), track_id, ip)
    }
}

impl<T: Serialize> IntoResponse for ResponseEnvelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Render a success envelope with an explicit status; missing data renders as `{}`
pub fn http_response<T: Serialize>(
    data: Option<T>,
    track_id: Option<String>,
    ip: Option<String>,
    status: StatusCode,
) -> Response {
    match data {
        Some(data) => (status, Json(ResponseEnvelope::new(data, track_id, ip))).into_response(),
        None => (status, Json(ResponseEnvelope::empty(track_id, ip))).into_response(),
    }
}

/// Failure envelope: `{track_id, ip, error: {code, message}}`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub track_id: Option<String>,
    pub ip: Option<String>,
    pub error: ErrorDetail,
    #[serde(skip)]
    pub status: StatusCode,
}

/// Error details
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    /// Stable error code
    pub code: String,
    /// Human-readable error message
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, code: impl Into<String>, message: Option<String>) -> Self {
        Self {
            track_id: None,
            ip: None,
            error: ErrorDetail {
                code: code.into(),
                message,
            },
            status,
        }
    }

    /// Framework-level error; the code is the numeric status
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(
            status,
            status.as_u16().to_string(),
            status.canonical_reason().map(str::to_string),
        )
    }

    /// Generic body for failures whose detail must not reach the client
    pub fn unhandled() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "500",
            Some(ErrorKind::DataResponseMalformed.message().to_string()),
        )
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_success_envelope_serialization() {
        let envelope = ResponseEnvelope::new(json!({"x": 1}), Some("t-1".into()), None);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value, json!({"track_id": "t-1", "ip": null, "data": {"x": 1}}));
    }

    #[test]
    fn test_empty_envelope_has_object_data() {
        let value = serde_json::to_value(ResponseEnvelope::empty(None, None)).unwrap();
        assert_eq!(value, json!({"track_id": null, "ip": null, "data": {}}));
    }

    #[test]
    fn test_error_envelope_shape() {
        let kind = ErrorKind::MsUnavailable;
        let err = ErrorResponse::new(
            kind.status_code(),
            kind.code(),
            Some(kind.message().to_string()),
        );
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(
            value,
            json!({
                "track_id": null,
                "ip": null,
                "error": {"code": "990", "message": "Microservice is unavailable"}
            })
        );
    }

    #[test]
    fn test_from_status_uses_numeric_code() {
        let err = ErrorResponse::from_status(StatusCode::NOT_FOUND);
        assert_eq!(err.error.code, "404");
        assert_eq!(err.error.message.as_deref(), Some("Not Found"));
    }

    #[tokio::test]
    async fn test_http_response_status_and_body() {
        let response = http_response(
            Some(json!([1, 2])),
            Some("t".into()),
            Some("10.0.0.1".into()),
            StatusCode::CREATED,
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_json(response).await,
            json!({"track_id": "t", "ip": "10.0.0.1", "data": [1, 2]})
        );
    }

    #[tokio::test]
    async fn test_http_response_defaults_to_empty_object() {
        let response = http_response(None::<Value>, None, None, StatusCode::ACCEPTED);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            body_json(response).await,
            json!({"track_id": null, "ip": null, "data": {}})
        );
    }

    #[tokio::test]
    async fn test_unhandled_response() {
        let response = ErrorResponse::unhandled().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "500");
        assert_eq!(
            body["error"]["message"],
            "An error occurred, the response data is malformed"
        );
    }
}
