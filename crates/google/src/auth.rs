//! OAuth bearer-token supply for the Google APIs.
//!
//! Credential acquisition itself happens outside this process. The adapter is
//! handed either a fixed access token or the path of a file that an external
//! refresher keeps current. Reauthenticating re-reads the source.

use std::path::PathBuf;

use pipeline::{ServiceError, ServiceKind};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Where the access token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// A fixed token (from config or env).
    Static(String),
    /// A file containing the token; surrounding whitespace is ignored.
    File(PathBuf),
}

/// Caches the current access token and reloads it on demand.
#[derive(Debug)]
pub struct TokenProvider {
    source: TokenSource,
    cached: RwLock<Option<String>>,
}

impl TokenProvider {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Create a static token provider.
    pub fn static_token(token: impl Into<String>) -> Self {
        Self::new(TokenSource::Static(token.into()))
    }

    /// Returns the current token, loading it on first use.
    pub async fn token(&self, service: ServiceKind) -> Result<String, ServiceError> {
        if let Some(token) = self.cached.read().await.as_ref() {
            return Ok(token.clone());
        }
        let token = self.load(service).await?;
        *self.cached.write().await = Some(token.clone());
        Ok(token)
    }

    /// Drops the cached token and loads a fresh one from the source.
    pub async fn refresh(&self, service: ServiceKind) -> Result<(), ServiceError> {
        let token = self.load(service).await?;
        *self.cached.write().await = Some(token);
        info!(%service, "access token reloaded");
        Ok(())
    }

    async fn load(&self, service: ServiceKind) -> Result<String, ServiceError> {
        let token = match &self.source {
            TokenSource::Static(token) => token.trim().to_string(),
            TokenSource::File(path) => {
                debug!(path = %path.display(), "reading access token");
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| ServiceError::Authentication {
                        service,
                        message: format!("cannot read token file {}: {e}", path.display()),
                    })?
                    .trim()
                    .to_string()
            }
        };
        if token.is_empty() {
            return Err(ServiceError::Authentication {
                service,
                message: "access token is empty".to_string(),
            });
        }
        Ok(token)
    }
}
