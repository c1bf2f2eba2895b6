//! Routes a model invocation to the provider of its family.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::ports::{ModelError, ModelRequest, ModelService};
use pipeline::{ModelId, ModelKey, ServiceError, ServiceKind};
use tracing::{debug, instrument};

use crate::attachments::{render_all, Capabilities, RenderedPart};

/// Connection settings for one provider.
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ProviderSettings {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(300),
            max_tokens: 4096,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `base_url` joined with `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, ModelError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| {
                ServiceError::Transport {
                    service: ServiceKind::Model,
                    message: format!("failed to build HTTP client: {e}"),
                }
                .into()
            })
    }
}

/// One model family's API.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// The family this provider serves.
    fn family(&self) -> ModelKey;

    /// Attachment types the API accepts.
    fn capabilities(&self) -> Capabilities;

    /// Sends `prompt` plus the rendered attachments and returns the reply text.
    async fn complete(
        &self,
        model: &ModelId,
        prompt: &str,
        parts: &[RenderedPart],
    ) -> Result<String, ModelError>;
}

/// [`ModelService`] that dispatches by model family.
#[derive(Default)]
pub struct ModelRouter {
    providers: BTreeMap<ModelKey, Arc<dyn ModelProvider>>,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under its family, replacing any earlier one.
    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.providers.insert(provider.family(), provider);
        self
    }

    /// Families with a configured provider.
    pub fn families(&self) -> impl Iterator<Item = &ModelKey> {
        self.providers.keys()
    }
}

#[async_trait]
impl ModelService for ModelRouter {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<String, ModelError> {
        let family = ModelKey::canonicalize(request.model);
        if !ModelKey::LEDGER_ORDER.contains(&family) {
            return Err(ModelError::UnknownModel {
                model: request.model.to_string(),
            });
        }
        let provider = self
            .providers
            .get(&family)
            .ok_or_else(|| ModelError::Unconfigured {
                model: request.model.to_string(),
            })?;

        let parts = render_all(request.attachments, provider.capabilities()).await;
        let prompt = request.full_prompt();
        debug!(%family, attachments = parts.len(), prompt_chars = prompt.len(), "invoking model");
        provider.complete(request.model, &prompt, &parts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Echoes the prompt and the number of parts it received.
    struct Echo {
        family: ModelKey,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModelProvider for Echo {
        fn family(&self) -> ModelKey {
            self.family.clone()
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::TEXT_ONLY
        }

        async fn complete(
            &self,
            model: &ModelId,
            prompt: &str,
            parts: &[RenderedPart],
        ) -> Result<String, ModelError> {
            self.seen.lock().unwrap().push(model.to_string());
            Ok(format!("{prompt}|{}", parts.len()))
        }
    }

    fn router() -> (ModelRouter, Arc<Echo>) {
        let echo = Arc::new(Echo {
            family: ModelKey::GPT,
            seen: Mutex::new(Vec::new()),
        });
        (ModelRouter::new().with_provider(echo.clone()), echo)
    }

    fn request<'a>(model: &'a ModelId, context: Option<&'a str>) -> ModelRequest<'a> {
        ModelRequest {
            model,
            prompt: "Prompt",
            context,
            attachments: &[],
        }
    }

    #[tokio::test]
    async fn routes_by_family_and_sends_prompt_then_context() {
        let (router, echo) = router();
        let model = ModelId::new("GPT-4o-mini").unwrap();

        let reply = router.invoke(request(&model, Some("Question"))).await.unwrap();

        assert_eq!(reply, "Prompt\n\nQuestion|0");
        assert_eq!(*echo.seen.lock().unwrap(), ["GPT-4o-mini"]);
    }

    #[tokio::test]
    async fn missing_provider_is_unconfigured() {
        let (router, _) = router();
        let model = ModelId::new("claude-3-opus").unwrap();
        let err = router.invoke(request(&model, None)).await.unwrap_err();
        assert!(matches!(err, ModelError::Unconfigured { .. }));
    }

    #[tokio::test]
    async fn unknown_prefix_is_rejected() {
        let (router, _) = router();
        let model = ModelId::new("mistral-large").unwrap();
        let err = router.invoke(request(&model, None)).await.unwrap_err();
        assert_eq!(err.to_string(), "unknown model prefix in 'mistral-large'");
    }
}
