//! Shared HTTP plumbing for the Sheets, Drive and Docs adapters.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{ServiceError, ServiceKind};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::TokenProvider;

pub const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_DRIVE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_DOCS_URL: &str = "https://docs.googleapis.com/v1";

/// Endpoints and limits for the Google adapters.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub sheets_url: String,
    pub drive_url: String,
    pub docs_url: String,
    pub timeout: Duration,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            sheets_url: DEFAULT_SHEETS_URL.to_string(),
            drive_url: DEFAULT_DRIVE_URL.to_string(),
            docs_url: DEFAULT_DOCS_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl GoogleConfig {
    /// Points every API at one base URL (used with a mock server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.sheets_url = url.clone();
        self.drive_url = url.clone();
        self.docs_url = url;
        self
    }
}

/// An authenticated HTTP client shared by the three adapters.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    http: Client,
    auth: Arc<TokenProvider>,
    config: GoogleConfig,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig, auth: Arc<TokenProvider>) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Transport {
                service: ServiceKind::Spreadsheet,
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, auth, config })
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn auth(&self) -> &TokenProvider {
        &self.auth
    }

    /// Sends an authenticated request and maps failure statuses.
    pub(crate) async fn send(
        &self,
        service: ServiceKind,
        request: RequestBuilder,
    ) -> Result<Response, ServiceError> {
        let token = self.auth.token(service).await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport(service, e))?;

        let status = response.status();
        debug!(%service, url = %response.url(), status = status.as_u16(), "google api response");
        if status.is_success() {
            return Ok(response);
        }

        let resource = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::from_status(service, status.as_u16(), resource, &body))
    }

    /// Sends a request and decodes its JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        service: ServiceKind,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        self.send(service, request)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Decode {
                service,
                message: e.to_string(),
            })
    }
}

/// Builds `base` + `segments`, percent-encoding each segment.
pub(crate) fn endpoint(
    service: ServiceKind,
    base: &str,
    segments: &[&str],
) -> Result<Url, ServiceError> {
    let invalid = |message: String| ServiceError::Transport { service, message };
    let mut url = Url::parse(base).map_err(|e| invalid(format!("invalid base URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| invalid(format!("base URL {base} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn transport(service: ServiceKind, error: reqwest::Error) -> ServiceError {
    ServiceError::Transport {
        service,
        message: error.to_string(),
    }
}
