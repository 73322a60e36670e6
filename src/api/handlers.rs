use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::middleware::logging::TRACK_ID_HEADER;
use crate::config::UpstreamConfig;
use crate::errors::{
    http_response, AppError, ErrorKind, Validate, ValidatedJson, ValidationErrors,
    ValidationIssue,
};
use crate::http_client::{header_map, ClientResult, HttpClient};

lazy_static::lazy_static! {
    static ref START_TIME: Instant = Instant::now();
}

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Longest accepted echo note
pub const MAX_NOTE_LENGTH: usize = 500;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub upstream: UpstreamConfig,
    pub client: HttpClient,
    pub instance_id: String,
}

impl AppStateInner {
    pub fn new(upstream: UpstreamConfig, instance_id: impl Into<String>) -> Self {
        let client = HttpClient::json().with_options(upstream.client_options());
        Self {
            upstream,
            client,
            instance_id: instance_id.into(),
        }
    }
}

/// Echo request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EchoRequest {
    pub name: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl Validate for EchoRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.name.trim().is_empty() {
            errors.push(ValidationIssue::new(
                ["body", "name"],
                "ensure this value has at least 1 characters",
            ));
        }
        if let Some(note) = &self.note {
            if note.chars().count() > MAX_NOTE_LENGTH {
                errors.push(ValidationIssue::new(
                    ["body", "note"],
                    format!(
                        "ensure this value has at most {} characters",
                        MAX_NOTE_LENGTH
                    ),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// `track_id` and `ip` correlation fields supplied by the caller
fn correlation(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let ip = value(FORWARDED_FOR_HEADER)
        .and_then(|v| v.split(',').next().map(|first| first.trim().to_string()));

    (value(TRACK_ID_HEADER), ip)
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "service-toolkit",
        "version": env!("CARGO_PKG_VERSION"),
        "instance_id": state.instance_id,
        "upstream_configured": state.upstream.base_url.is_some(),
        "uptime_seconds": START_TIME.elapsed().as_secs(),
    }))
}

/// Validate a body and hand it back in the success envelope
pub async fn echo(
    headers: HeaderMap,
    ValidatedJson(payload): ValidatedJson<EchoRequest>,
) -> Response {
    let (track_id, ip) = correlation(&headers);
    info!("Echo request: name='{}'", payload.name);

    http_response(Some(payload), track_id, ip, StatusCode::OK)
}

/// Join the relayed path onto the upstream base one decoded segment at a time.
/// Each segment is re-encoded, so `/` and `?` smuggled in as `%2F`/`%3F` stay
/// inside it; dot segments are refused.
fn upstream_url(base_url: &str, path: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(base_url).map_err(|e| {
        error!(base_url = %base_url, error = %e, "Upstream base URL does not parse");
        AppError::from(ErrorKind::MsInvalidApiPath)
    })?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| AppError::from(ErrorKind::MsInvalidApiPath))?;
        segments.pop_if_empty();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(ValidationErrors::single(
                    ["path", "path"],
                    "relative path segments are not permitted",
                )
                .into());
            }
            segments.push(segment);
        }
    }

    Ok(url)
}

/// Forward a GET to the configured upstream
pub async fn relay(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let base_url = state
        .upstream
        .base_url
        .as_deref()
        .ok_or(ErrorKind::MsInvalidApiPath)?;
    let url = upstream_url(base_url, &path)?;
    let (track_id, ip) = correlation(&headers);

    let params: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let forwarded = track_id
        .as_deref()
        .map(|id| header_map([(TRACK_ID_HEADER, id)]))
        .transpose()
        .map_err(anyhow::Error::from)?;

    info!("Relay request: url='{}', params={}", url, params.len());

    // Forward upstream
    match state.client.get(url.as_str(), &params, forwarded, None).await {
        Ok(ClientResult::Body(body)) => {
            Ok(http_response(Some(body), track_id, ip, StatusCode::OK))
        }
        Ok(ClientResult::Failure(failure)) => {
            warn!(
                url = %url,
                status = failure.status,
                "Upstream answered without usable JSON"
            );
            Err(ErrorKind::DataResponseMalformed.into())
        }
        Err(e) => {
            error!(url = %url, error = %e, "Upstream unavailable");
            Err(ErrorKind::MsUnavailable.into())
        }
    }
}
