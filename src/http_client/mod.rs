//! JSON / form-encoded HTTP clients for calling upstream services
//!
//! Both the async [`HttpClient`] and the [`BlockingHttpClient`] return the same
//! [`ClientResult`]: the upstream JSON body, or a normalized failure object
//! when the upstream did not answer with usable JSON. Transport problems
//! (connect errors, timeouts, invalid URLs) are reported as [`ClientError`].

pub mod async_client;
pub mod blocking;

pub use async_client::HttpClient;
pub use blocking::BlockingHttpClient;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics::registry::{UPSTREAM_REQUESTS_TOTAL, UPSTREAM_REQUEST_DURATION_SECONDS};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Code carried by every normalized failure
pub const HTTP_ERROR_CODE: &str = "HTTP_ERROR";

/// Body convention of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Form,
}

impl ContentKind {
    /// Content-Type applied when the caller supplies none
    pub fn default_content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Form => "application/x-www-form-urlencoded",
        }
    }
}

/// How responses other than 200/201 are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonSuccessPolicy {
    /// A parseable JSON body is returned as the result
    #[default]
    PassThrough,
    /// Always returned as a normalized failure
    Surface,
}

impl std::str::FromStr for NonSuccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pass_through" | "passthrough" => Ok(Self::PassThrough),
            "surface" => Ok(Self::Surface),
            other => Err(format!("unknown non-success policy: {}", other)),
        }
    }
}

/// Per-client settings
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Used when a call passes no timeout
    pub timeout: Duration,
    /// Skip upstream certificate verification
    pub accept_invalid_certs: bool,
    pub non_success_policy: NonSuccessPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
            non_success_policy: NonSuccessPolicy::default(),
        }
    }
}

/// Normalized failure: `{data: 0, code: "HTTP_ERROR", message, status}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamFailure {
    pub data: u8,
    pub code: String,
    /// Raw upstream body text
    pub message: String,
    pub status: u16,
}

impl UpstreamFailure {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            data: 0,
            code: HTTP_ERROR_CODE.to_string(),
            message: message.into(),
            status,
        }
    }
}

/// Outcome of a completed upstream call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientResult {
    Body(Value),
    Failure(UpstreamFailure),
}

impl ClientResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Body(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// JSON form as handed to callers
    pub fn to_value(&self) -> Value {
        match self {
            Self::Body(value) => value.clone(),
            Self::Failure(failure) => serde_json::json!({
                "data": failure.data,
                "code": failure.code,
                "message": failure.message,
                "status": failure.status,
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("invalid header {name}")]
    InvalidHeader { name: String },

    #[error("request to {url} timed out")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    fn from_send(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                source,
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source,
            }
        }
    }

    fn from_body(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                source,
            }
        } else {
            Self::Body {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Caller headers with the kind's Content-Type added when absent
pub fn prepare_headers(kind: ContentKind, headers: Option<HeaderMap>) -> HeaderMap {
    let mut headers = headers.unwrap_or_default();
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(kind.default_content_type()),
        );
    }
    headers
}

/// Build a header map from string pairs
pub fn header_map<'a, I>(pairs: I) -> Result<HeaderMap, ClientError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let invalid = || ClientError::InvalidHeader {
            name: name.to_string(),
        };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Turn a status and raw body into a [`ClientResult`]
pub fn normalize(status: u16, body: &[u8], policy: NonSuccessPolicy) -> ClientResult {
    let accepted = status == 200 || status == 201;

    if accepted || policy == NonSuccessPolicy::PassThrough {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            return ClientResult::Body(value);
        }
    }

    ClientResult::Failure(UpstreamFailure::new(
        status,
        String::from_utf8_lossy(body).into_owned(),
    ))
}

fn record_outcome(
    method: &str,
    url: &str,
    outcome: &Result<ClientResult, ClientError>,
    elapsed: Duration,
) {
    let label = match outcome {
        Ok(ClientResult::Body(_)) => "ok",
        Ok(ClientResult::Failure(_)) => "upstream_error",
        Err(_) => "transport_error",
    };

    UPSTREAM_REQUESTS_TOTAL
        .with_label_values(&[method, label])
        .inc();
    UPSTREAM_REQUEST_DURATION_SECONDS
        .with_label_values(&[method])
        .observe(elapsed.as_secs_f64());

    match outcome {
        Ok(ClientResult::Body(_)) => {
            debug!(method, url, duration_ms = %elapsed.as_millis(), "Upstream call succeeded");
        }
        Ok(ClientResult::Failure(failure)) => {
            warn!(
                method,
                url,
                status = failure.status,
                duration_ms = %elapsed.as_millis(),
                "Upstream returned an unusable response"
            );
        }
        Err(e) => {
            warn!(method, url, error = %e, duration_ms = %elapsed.as_millis(), "Upstream call failed");
        }
    }
}
