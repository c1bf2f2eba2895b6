//! Gemini `generateContent` provider.

use async_trait::async_trait;
use pipeline::ports::ModelError;
use pipeline::{ModelId, ModelKey};
use serde_json::{json, Value};

use crate::attachments::{Capabilities, RenderedPart, PDF_MEDIA_TYPE};
use crate::http::{join_text_parts, non_empty, post_json};
use crate::router::{ModelProvider, ProviderSettings};

pub const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    http: reqwest::Client,
    settings: ProviderSettings,
}

impl GeminiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self, ModelError> {
        Ok(Self {
            http: settings.http_client()?,
            settings,
        })
    }
}

/// Request parts: the prompt, then one inline-data part per attachment.
pub fn request_parts(prompt: &str, parts: &[RenderedPart]) -> Vec<Value> {
    let mut out = vec![json!({ "text": prompt })];
    out.extend(parts.iter().map(|part| match part {
        RenderedPart::Image { media_type, data } => {
            json!({ "inline_data": { "mime_type": media_type, "data": data } })
        }
        RenderedPart::Pdf { data, .. } => {
            json!({ "inline_data": { "mime_type": PDF_MEDIA_TYPE, "data": data } })
        }
        RenderedPart::Text(text) => json!({ "text": text }),
    }));
    out
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn family(&self) -> ModelKey {
        ModelKey::GEMINI
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
            "contents": [{ "role": "user", "parts": request_parts(prompt, parts) }],
            "generationConfig": { "maxOutputTokens": self.settings.max_tokens },
        });
        let url = self
            .settings
            .url(&format!("models/{}:generateContent", model.as_str()));
        let request = self
            .http
            .post(url)
            .query(&[("key", self.settings.api_key.as_str())])
            .json(&body);

        let response = post_json(request).await?;
        let text = join_text_parts(response.pointer("/candidates/0/content/parts"));
        non_empty(model.as_str(), text)
    }
}
