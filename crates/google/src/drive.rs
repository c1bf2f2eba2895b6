//! [`CloudStorage`] over the Drive v3 REST API.

use async_trait::async_trait;
use pipeline::ports::{CloudStorage, StoredFile};
use pipeline::{FileId, FolderId, ServiceError, ServiceKind};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::client::{endpoint, GoogleClient};

const SERVICE: ServiceKind = ServiceKind::Storage;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
}

/// Drive query selecting the live, non-folder children of `folder`.
pub fn children_query(folder: &FolderId) -> String {
    format!(
        "'{}' in parents and trashed=false and mimeType!='{FOLDER_MIME_TYPE}'",
        folder.as_str().replace('\'', "\\'")
    )
}

pub struct GoogleDrive {
    client: GoogleClient,
}

impl GoogleDrive {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }

    fn files_url(&self, segments: &[&str]) -> Result<reqwest::Url, ServiceError> {
        let mut all = vec!["files"];
        all.extend_from_slice(segments);
        endpoint(SERVICE, &self.client.config().drive_url, &all)
    }
}

#[async_trait]
impl CloudStorage for GoogleDrive {
    #[instrument(skip_all, fields(folder = %folder))]
    async fn list_files(&self, folder: &FolderId) -> Result<Vec<StoredFile>, ServiceError> {
        let query = children_query(folder);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.http().get(self.files_url(&[])?).query(&[
                ("q", query.as_str()),
                ("fields", "nextPageToken, files(id, name, mimeType)"),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: FileList = self.client.send_json(SERVICE, request).await?;
            files.extend(page.files.into_iter().filter_map(|entry| {
                Some(StoredFile {
                    id: FileId::new(entry.id)?,
                    name: entry.name,
                    mime_type: entry.mime_type,
                })
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(count = files.len(), "folder listed");
        Ok(files)
    }

    async fn download(&self, file: &FileId) -> Result<Vec<u8>, ServiceError> {
        let request = self
            .client
            .http()
            .get(self.files_url(&[file.as_str()])?)
            .query(&[("alt", "media")]);
        let bytes = self
            .client
            .send(SERVICE, request)
            .await?
            .bytes()
            .await
            .map_err(|e| ServiceError::Transport {
                service: SERVICE,
                message: e.to_string(),
            })?;
        debug!(file = %file, bytes = bytes.len(), "file downloaded");
        Ok(bytes.to_vec())
    }

    async fn move_file(
        &self,
        file: &FileId,
        from: &FolderId,
        to: &FolderId,
    ) -> Result<(), ServiceError> {
        let request = self
            .client
            .http()
            .patch(self.files_url(&[file.as_str()])?)
            .query(&[
                ("addParents", to.as_str()),
                ("removeParents", from.as_str()),
                ("fields", "id, parents"),
            ])
            .json(&serde_json::json!({}));
        self.client.send(SERVICE, request).await?;
        debug!(file = %file, from = %from, to = %to, "file moved");
        Ok(())
    }
}
