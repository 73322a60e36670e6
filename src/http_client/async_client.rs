use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::Serialize;
use std::time::{Duration, Instant};

use super::{
    normalize, prepare_headers, record_outcome, ClientError, ClientOptions, ClientResult,
    ContentKind,
};

/// Async upstream client; every call opens and drops its own connection pool
#[derive(Debug, Clone)]
pub struct HttpClient {
    kind: ContentKind,
    options: ClientOptions,
}

impl HttpClient {
    pub fn new(kind: ContentKind, options: ClientOptions) -> Self {
        Self { kind, options }
    }

    /// JSON bodies, `application/json` by default
    pub fn json() -> Self {
        Self::new(ContentKind::Json, ClientOptions::default())
    }

    /// Form bodies, `application/x-www-form-urlencoded` by default
    pub fn form() -> Self {
        Self::new(ContentKind::Form, ClientOptions::default())
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        headers: Option<HeaderMap>,
        timeout: Option<Duration>,
    ) -> Result<ClientResult, ClientError> {
        self.execute(Method::GET, url, params, None::<&()>, headers, timeout)
            .await
    }

    /// POST `body` encoded per the client's kind
    pub async fn post<B>(
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
            .await
    }

    async fn execute<B>(
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
        let outcome = self
            .send(method.clone(), url, params, body, headers, timeout)
            .await;
        record_outcome(method.as_str(), url, &outcome, start.elapsed());
        outcome
    }

    async fn send<B>(
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
        let client = reqwest::Client::builder()
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
            .await
            .map_err(|e| ClientError::from_send(url, e))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_body(url, e))?;

        Ok(normalize(status, &bytes, self.options.non_success_policy))
    }
}
