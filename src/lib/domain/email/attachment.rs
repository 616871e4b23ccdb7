//! Attachments and inline images

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::errors::EmailError;

/// Attachment content as handed to the builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentData {
    /// Raw bytes, encoded before they reach a service
    Raw(Vec<u8>),

    /// Text that is already base64 encoded
    Base64(String),
}

impl From<Vec<u8>> for AttachmentData {
    fn from(bytes: Vec<u8>) -> Self {
        AttachmentData::Raw(bytes)
    }
}

impl From<&[u8]> for AttachmentData {
    fn from(bytes: &[u8]) -> Self {
        AttachmentData::Raw(bytes.to_vec())
    }
}

/// A file attached to, or embedded in, a message.
///
/// `data` always holds standard base64 text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// The MIME type, e.g. `application/pdf`
    pub mime_type: String,

    /// The file name, or the content id of an inline image
    pub name: String,

    /// The base64 encoded content
    pub data: String,
}

impl Attachment {
    /// Creates an attachment, encoding raw content and checking base64 content.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: AttachmentData,
    ) -> Result<Self, EmailError> {
        let name = name.into();

        let data = match data {
            AttachmentData::Raw(bytes) => STANDARD.encode(bytes),
            AttachmentData::Base64(text) => {
                if STANDARD.decode(text.as_bytes()).is_err() {
                    return Err(EmailError::InvalidAttachment { name });
                }

                text
            }
        };

        Ok(Self {
            mime_type: mime_type.into(),
            name,
            data,
        })
    }

    /// Decodes the content back into bytes
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.as_bytes())
    }
}
