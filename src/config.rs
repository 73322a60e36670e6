use anyhow::{anyhow, Context, Result};
use std::env;
use std::time::Duration;

use crate::http_client::{ClientOptions, NonSuccessPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub instance_id: String,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Target of the relay endpoint; relaying is refused when unset
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
    pub accept_invalid_certs: bool,
    pub non_success_policy: NonSuccessPolicy,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: 10,
            accept_invalid_certs: false,
            non_success_policy: NonSuccessPolicy::PassThrough,
        }
    }
}

impl UpstreamConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.timeout_seconds),
            accept_invalid_certs: self.accept_invalid_certs,
            non_success_policy: self.non_success_policy,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("API_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .context("API_PORT must be a valid port number")?,
                // Used only for debugging/observability. If unset, fall back to HOSTNAME if
                // present (e.g. Docker/Kubernetes), otherwise "unknown".
                instance_id: env::var("INSTANCE_ID")
                    .or_else(|_| env::var("HOSTNAME"))
                    .unwrap_or_else(|_| "unknown".to_string()),
            },
            upstream: Self::upstream_config_from_env()?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn upstream_config_from_env() -> Result<UpstreamConfig> {
        let base_url = env::var("UPSTREAM_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(UpstreamConfig {
            base_url,
            timeout_seconds: env::var("UPSTREAM_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("UPSTREAM_TIMEOUT_SECONDS must be a valid number")?,
            accept_invalid_certs: env::var("UPSTREAM_ACCEPT_INVALID_CERTS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("UPSTREAM_ACCEPT_INVALID_CERTS must be true or false")?,
            non_success_policy: env::var("UPSTREAM_NON_SUCCESS_POLICY")
                .unwrap_or_else(|_| "pass_through".to_string())
                .parse::<NonSuccessPolicy>()
                .map_err(|e| anyhow!(e))
                .context("UPSTREAM_NON_SUCCESS_POLICY must be pass_through or surface")?,
        })
    }
}
