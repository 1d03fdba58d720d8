use serde::de::DeserializeOwned;
use sockpit_core::{ApiResult, LogsResponse, ServerConfig, StatusResponse};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned {status} for {path}")]
    Status {
        path: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("malformed reply from {path}: {source}")]
    Body {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Client for the relay's control and telemetry REST endpoints.
#[derive(Debug, Clone)]
pub struct Backend {
    http: reqwest::Client,
    base_url: String,
}

impl Backend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn server_status(&self) -> Result<StatusResponse, BackendError> {
        self.get_json("/api/server/status").await
    }

    pub async fn recent_logs(&self) -> Result<LogsResponse, BackendError> {
        self.get_json("/api/logs").await
    }

    pub async fn fetch_config(&self) -> Result<ServerConfig, BackendError> {
        self.get_json("/api/config").await
    }

    pub async fn save_config(&self, config: &ServerConfig) -> Result<ApiResult, BackendError> {
        const PATH: &str = "/api/config";
        let response = self
            .http
            .post(self.url(PATH))
            .json(config)
            .send()
            .await
            .map_err(|source| BackendError::Transport { path: PATH, source })?;
        Self::read_result(PATH, response).await
    }

    pub async fn start_server(&self) -> Result<ApiResult, BackendError> {
        self.post_action("/api/server/start").await
    }

    pub async fn stop_server(&self) -> Result<ApiResult, BackendError> {
        self.post_action("/api/server/stop").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, BackendError> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|source| BackendError::Transport { path, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status { path, status });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| BackendError::Body { path, source })
    }

    async fn post_action(&self, path: &'static str) -> Result<ApiResult, BackendError> {
        let response = self
            .http
            .post(self.url(path))
            .send()
            .await
            .map_err(|source| BackendError::Transport { path, source })?;
        Self::read_result(path, response).await
    }

    /// Action failures come back as non-2xx with a `{success, message}` body;
    /// the body is decoded either way so the message reaches the operator.
    async fn read_result(
        path: &'static str,
        response: reqwest::Response,
    ) -> Result<ApiResult, BackendError> {
        let status = response.status();
        match response.json::<ApiResult>().await {
            Ok(result) => Ok(result),
            Err(_) if !status.is_success() => Err(BackendError::Status { path, status }),
            Err(source) => Err(BackendError::Body { path, source }),
        }
    }
}
