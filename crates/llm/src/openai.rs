//! OpenAI chat-completions provider, also used for DeepSeek's compatible API.

use async_trait::async_trait;
use pipeline::ports::ModelError;
use pipeline::{ModelId, ModelKey};
use serde_json::{json, Value};

use crate::attachments::{Capabilities, RenderedPart};
use crate::http::{non_empty, post_json};
use crate::router::{ModelProvider, ProviderSettings};

pub const OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_URL: &str = "https://api.deepseek.com/v1";

pub struct OpenAiProvider {
    http: reqwest::Client,
    settings: ProviderSettings,
    family: ModelKey,
    capabilities: Capabilities,
}

impl OpenAiProvider {
    /// GPT models: images and PDFs are sent inline.
    pub fn openai(settings: ProviderSettings) -> Result<Self, ModelError> {
        Self::build(settings, ModelKey::GPT, Capabilities::ALL)
    }

    /// DeepSeek models: text only.
    pub fn deepseek(settings: ProviderSettings) -> Result<Self, ModelError> {
        Self::build(settings, ModelKey::DEEPSEEK, Capabilities::TEXT_ONLY)
    }

    fn build(
        settings: ProviderSettings,
        family: ModelKey,
        capabilities: Capabilities,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            http: settings.http_client()?,
            settings,
            family,
            capabilities,
        })
    }
}

/// The user message content: the prompt followed by one part per attachment.
pub fn message_content(prompt: &str, parts: &[RenderedPart]) -> Value {
    if parts.is_empty() {
        return json!(prompt);
    }
    let mut content = vec![json!({ "type": "text", "text": prompt })];
    for part in parts {
        content.push(match part {
            RenderedPart::Image { .. } => json!({
                "type": "image_url",
                "image_url": { "url": part.data_url() },
            }),
            RenderedPart::Pdf { file_name, .. } => json!({
                "type": "file",
                "file": { "filename": file_name, "file_data": part.data_url() },
            }),
            RenderedPart::Text(text) => json!({ "type": "text", "text": text }),
        });
    }
    Value::Array(content)
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn family(&self) -> ModelKey {
        self.family.clone()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn complete(
        &self,
        model: &ModelId,
        prompt: &str,
        parts: &[RenderedPart],
    ) -> Result<String, ModelError> {
        let body = json!({
            "model": model.as_str(),
            "messages": [{ "role": "user", "content": message_content(prompt, parts) }],
            "max_tokens": self.settings.max_tokens,
        });
        let request = self
            .http
            .post(self.settings.url("chat/completions"))
            .bearer_auth(&self.settings.api_key)
            .json(&body);

        let response = post_json(request).await?;
        let text = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        non_empty(model.as_str(), text)
    }
}
