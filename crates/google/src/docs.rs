//! [`DocumentService`] over the Docs v1 REST API.

use async_trait::async_trait;
use pipeline::ports::{DocumentService, TextInsert};
use pipeline::{DocumentId, ServiceError, ServiceKind};
use serde_json::{json, Value};
use tracing::info;

use crate::client::{endpoint, GoogleClient};

const SERVICE: ServiceKind = ServiceKind::Documents;

/// `batchUpdate` request body inserting each text at its index, in order.
pub fn batch_update_body(inserts: &[TextInsert]) -> Value {
    let requests: Vec<Value> = inserts
        .iter()
        .map(|insert| {
            json!({
                "insertText": {
                    "location": { "index": insert.index },
                    "text": insert.text,
                }
            })
        })
        .collect();
    json!({ "requests": requests })
}

pub struct GoogleDocs {
    client: GoogleClient,
}

impl GoogleDocs {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentService for GoogleDocs {
    async fn insert_text(
        &self,
        document: &DocumentId,
        inserts: &[TextInsert],
    ) -> Result<(), ServiceError> {
        if inserts.is_empty() {
            return Ok(());
        }
        let action = format!("{}:batchUpdate", document.as_str());
        let url = endpoint(SERVICE, &self.client.config().docs_url, &["documents", &action])?;
        let request = self
            .client
            .http()
            .post(url)
            .json(&batch_update_body(inserts));
        self.client.send(SERVICE, request).await?;
        info!(document = %document, inserts = inserts.len(), "document updated");
        Ok(())
    }
}
