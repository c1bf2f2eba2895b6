//! JSON-over-HTTP helper shared by the providers.

use pipeline::ports::ModelError;
use pipeline::{ServiceError, ServiceKind};
use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::debug;

/// Sends a provider request and returns its JSON body.
pub(crate) async fn post_json(request: RequestBuilder) -> Result<Value, ModelError> {
    let response = request.send().await.map_err(|e| ServiceError::Transport {
        service: ServiceKind::Model,
        message: e.to_string(),
    })?;

    let status = response.status();
    debug!(url = %response.url(), status = status.as_u16(), "model api response");
    if !status.is_success() {
        let resource = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::from_status(ServiceKind::Model, status.as_u16(), resource, &body).into());
    }

    response.json().await.map_err(|e| {
        ServiceError::Decode {
            service: ServiceKind::Model,
            message: e.to_string(),
        }
        .into()
    })
}

/// Joins the `text` fields of an array of content parts.
pub(crate) fn join_text_parts(parts: Option<&Value>) -> String {
    parts
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

/// Fails with [`ModelError::EmptyResponse`] when `text` is blank.
pub(crate) fn non_empty(model: &str, text: String) -> Result<String, ModelError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ModelError::EmptyResponse {
            model: model.to_string(),
        });
    }
    Ok(trimmed.to_string())
}
