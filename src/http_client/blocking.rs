use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Serialize;
use std::time::{Duration, Instant};

use super::{
    normalize, prepare_headers, record_outcome, ClientError, ClientOptions, ClientResult,
    ContentKind,
};

/// Blocking counterpart of [`super::HttpClient`]
///
/// Must not be called from inside an async runtime; wrap calls in
/// `tokio::task::spawn_blocking` there.
#[derive(Debug, Clone)]
pub struct BlockingHttpClient {
    kind: ContentKind,
    options: ClientOptions,
}

impl BlockingHttpClient {
    pub fn new(kind: ContentKind, options: ClientOptions) -> Self {
        Self { kind, options }
    }

    pub fn json() -> Self {
        Self::new(ContentKind::Json, ClientOptions::default())
    }

    pub fn form() -> Self {
        Self::new(ContentKind::Form, ClientOptions::default())
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: Option<HeaderMap>,
        timeout: Option<Duration>,
    ) -> Result<ClientResult, ClientError> {
        self.execute(Method::GET, url, params, None::<&()>, headers, timeout)
    }

    pub fn post<B>(
        &self,
        url: &str,
        body: &B,
        headers: Option<HeaderMap>,
        timeout: Option<Duration>,
    ) -> Result<ClientResult, ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(Method::POST, url, &[], Some(body), headers, timeout)
    }

    fn execute<B>(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        body: Option<&B>,
        headers: Option<HeaderMap>,
        timeout: Option<Duration>,
    ) -> Result<ClientResult, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let start = Instant::now();
        let outcome = self.send(method.clone(), url, params, body, headers, timeout);
        record_outcome(method.as_str(), url, &outcome, start.elapsed());
        outcome
    }

    fn send<B>(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        body: Option<&B>,
        headers: Option<HeaderMap>,
        timeout: Option<Duration>,
    ) -> Result<ClientResult, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout.unwrap_or(self.options.timeout))
            .danger_accept_invalid_certs(self.options.accept_invalid_certs)
            .build()
            .map_err(ClientError::Build)?;

        let mut request = client
            .request(method, url)
            .headers(prepare_headers(self.kind, headers));
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(body) = body {
            request = match self.kind {
                ContentKind::Json => request.json(body),
                ContentKind::Form => request.form(body),
            };
        }

        let response = request
            .send()
            .map_err(|e| ClientError::from_send(url, e))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .map_err(|e| ClientError::from_body(url, e))?;

        Ok(normalize(status, &bytes, self.options.non_success_policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{header_map, UpstreamFailure};
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_json_get_returns_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("id", "7"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"x": 1})))
            .mount(&server)
            .await;

        let url = format!("{}/items", server.uri());
        let result = tokio::task::spawn_blocking(move || {
            BlockingHttpClient::json().get(&url, &[("id", "7")], None, None)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result, ClientResult::Body(json!({"x": 1})));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_json_post_sends_json_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/items"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"name": "widget"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"x": 1})))
            .mount(&server)
            .await;

        let url = format!("{}/items", server.uri());
        let result = tokio::task::spawn_blocking(move || {
            BlockingHttpClient::json().post(&url, &json!({"name": "widget"}), None, None)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result, ClientResult::Body(json!({"x": 1})));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_form_get_applies_default_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lookup"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"found": true})))
            .mount(&server)
            .await;

        let url = format!("{}/lookup", server.uri());
        let result = tokio::task::spawn_blocking(move || {
            BlockingHttpClient::form().get(&url, &[], None, None)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result.body(), Some(&json!({"found": true})));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_returns_same_normalized_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/explode"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let url = format!("{}/explode", server.uri());
        let result = tokio::task::spawn_blocking(move || {
            BlockingHttpClient::json().get(&url, &[], None, None)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result, ClientResult::Failure(UpstreamFailure::new(500, "boom")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_form_post() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("name=widget"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 3})))
            .mount(&server)
            .await;

        let url = format!("{}/submit", server.uri());
        let result = tokio::task::spawn_blocking(move || {
            BlockingHttpClient::form().post(&url, &[("name", "widget")], None, None)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result.body(), Some(&json!({"id": 3})));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_keeps_explicit_content_type() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items"))
            .and(header("content-type", "text/csv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let url = format!("{}/items", server.uri());
        let result = tokio::task::spawn_blocking(move || {
            let headers = header_map([("content-type", "text/csv")])?;
            BlockingHttpClient::form().get(&url, &[], Some(headers), None)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result.body(), Some(&json!([])));
    }
}
