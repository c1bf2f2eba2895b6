//! Rendering local attachments into model-input parts.
//!
//! Rendering never fails: an unreadable file, an unsupported type, or a PDF
//! sent to a provider that cannot take files becomes a short text part that
//! tells the model what it is missing.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pipeline::ports::{Attachment, AttachmentKind};
use tracing::warn;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// One attachment, ready to embed in a provider request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedPart {
    /// Base64 image data with its media type.
    Image { media_type: &'static str, data: String },
    /// Base64 PDF data.
    Pdf { file_name: String, data: String },
    /// Fallback text standing in for the attachment.
    Text(String),
}

impl RenderedPart {
    /// `data:` URL form of binary parts.
    pub fn data_url(&self) -> Option<String> {
        match self {
            Self::Image { media_type, data } => Some(format!("data:{media_type};base64,{data}")),
            Self::Pdf { data, .. } => Some(format!("data:{PDF_MEDIA_TYPE};base64,{data}")),
            Self::Text(_) => None,
        }
    }
}

/// What a provider can accept besides text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub images: bool,
    pub pdf: bool,
}

impl Capabilities {
    pub const ALL: Self = Self { images: true, pdf: true };
    pub const TEXT_ONLY: Self = Self { images: false, pdf: false };
}

/// Renders one attachment for a provider with the given capabilities.
pub async fn render(attachment: &Attachment, caps: Capabilities) -> RenderedPart {
    let name = &attachment.name;
    let supported = match attachment.kind {
        AttachmentKind::Pdf => caps.pdf,
        AttachmentKind::Image { .. } => caps.images,
        AttachmentKind::Unsupported => {
            return RenderedPart::Text(format!("[Unsupported attachment type: {name}]"));
        }
    };
    if !supported {
        return RenderedPart::Text(format!("[Attachment not supported by this model: {name}]"));
    }

    let bytes = match tokio::fs::read(&attachment.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %attachment.path.display(), error = %e, "failed to read attachment");
            return RenderedPart::Text(format!("[Failed to process attachment: {name}]"));
        }
    };
    let data = STANDARD.encode(bytes);
    match attachment.kind {
        AttachmentKind::Image { media_type } => RenderedPart::Image { media_type, data },
        _ => RenderedPart::Pdf {
            file_name: name.clone(),
            data,
        },
    }
}

/// Renders every attachment, in order.
pub async fn render_all(attachments: &[Attachment], caps: Capabilities) -> Vec<RenderedPart> {
    let mut parts = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        parts.push(render(attachment, caps).await);
    }
    parts
}
