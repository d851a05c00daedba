//! Object storage for uploaded proof-of-payment files.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::error::GatewayError;

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name, if any.
    pub file_name: Option<String>,
    /// Client-supplied content type, if any.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Bytes,
}

/// File-upload collaborator: stores a file and returns its public URL.
#[async_trait]
pub trait ProofStorage: Send + Sync + fmt::Debug {
    /// Stores `file`, returning a URL it can be fetched from.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if the file cannot be written.
    async fn upload(&self, file: UploadedFile) -> Result<String, GatewayError>;
}

/// Stores uploads as files under a local directory.
#[derive(Debug, Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDiskStorage {
    /// Creates a store writing to `root` and serving from `public_base_url`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Directory uploads are written to.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl ProofStorage for LocalDiskStorage {
    async fn upload(&self, file: UploadedFile) -> Result<String, GatewayError> {
        let key = match file.file_name.as_deref().and_then(extension) {
            Some(ext) => format!("{}.{ext}", uuid::Uuid::new_v4()),
            None => uuid::Uuid::new_v4().to_string(),
        };
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&key), &file.bytes).await?;
        tracing::debug!(%key, size = file.bytes.len(), "proof file stored");
        Ok(format!("{}/{key}", self.public_base_url))
    }
}

/// Lower-cased alphanumeric extension of `name`, if it has a usable one.
fn extension(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
