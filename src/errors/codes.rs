use axum::http::StatusCode;
use std::fmt;

/// Known application error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Upstream microservice could not be reached
    MsUnavailable,

    /// Upstream microservice path is not configured or not routable
    MsInvalidApiPath,

    /// Response data could not be interpreted
    DataResponseMalformed,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 3] = [
        Self::MsUnavailable,
        Self::MsInvalidApiPath,
        Self::DataResponseMalformed,
    ];

    /// HTTP status returned for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MsUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MsInvalidApiPath => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DataResponseMalformed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::MsUnavailable => "990",
            Self::MsInvalidApiPath => "991",
            Self::DataResponseMalformed => "992",
        }
    }

    /// Human-readable message
    pub fn message(&self) -> &'static str {
        match self {
            Self::MsUnavailable => "Microservice is unavailable",
            Self::MsInvalidApiPath => "Microservice API path is invalid",
            Self::DataResponseMalformed => "An error occurred, the response data is malformed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MsUnavailable => write!(f, "MS_UNAVAILABLE"),
            Self::MsInvalidApiPath => write!(f, "MS_INVALID_API_PATH"),
            Self::DataResponseMalformed => write!(f, "DATA_RESPONSE_MALFORMED"),
        }
    }
}
