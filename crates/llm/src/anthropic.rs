//! Anthropic messages provider.

use async_trait::async_trait;
use pipeline::ports::ModelError;
use pipeline::{ModelId, ModelKey};
use serde_json::{json, Value};

use crate::attachments::{Capabilities, RenderedPart, PDF_MEDIA_TYPE};
use crate::http::{join_text_parts, non_empty, post_json};
use crate::router::{ModelProvider, ProviderSettings};

pub const ANTHROPIC_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    http: reqwest::Client,
    settings: ProviderSettings,
}

impl AnthropicProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, ModelError> {
        Ok(Self {
            http: settings.http_client()?,
            settings,
        })
    }
}

/// Content blocks: attachments first, then the prompt.
pub fn content_blocks(prompt: &str, parts: &[RenderedPart]) -> Vec<Value> {
    let mut blocks: Vec<Value> = parts
        .iter()
        .map(|part| match part {
            RenderedPart::Image { media_type, data } => json!({
                "type": "image",
                "source": { "type": "base64", "media_type": media_type, "data": data },
            }),
            RenderedPart::Pdf { data, .. } => json!({
                "type": "document",
                "source": { "type": "base64", "media_type": PDF_MEDIA_TYPE, "data": data },
            }),
            RenderedPart::Text(text) => json!({ "type": "text", "text": text }),
        })
        .collect();
    blocks.push(json!({ "type": "text", "text": prompt }));
    blocks
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn family(&self) -> ModelKey {
        ModelKey::CLAUDE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    async fn complete(
        &self,
        model: &ModelId,
        prompt: &str,
        parts: &[RenderedPart],
    ) -> Result<String, ModelError> {
        let body = json!({
            "model": model.as_str(),
            "max_tokens": self.settings.max_tokens,
            "messages": [{ "role": "user", "content": content_blocks(prompt, parts) }],
        });
        let request = self
            .http
            .post(self.settings.url("v1/messages"))
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let response = post_json(request).await?;
        non_empty(model.as_str(), join_text_parts(response.get("content")))
    }
}
