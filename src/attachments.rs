//! User-supplied files: fetching from the transport and storing on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AttachmentError;
use crate::form::{FileField, FileRef};

/// How the attachment arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    Document,
}

/// Transport-level handle to an attachment that has not been downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Name of the channel that can resolve `file_id`.
    pub channel: String,
    pub file_id: String,
    /// Original file name for documents.
    pub file_name: Option<String>,
    pub kind: AttachmentKind,
}

impl AttachmentRef {
    pub fn photo(channel: &str, file_id: &str) -> Self {
        Self {
            channel: channel.to_string(),
            file_id: file_id.to_string(),
            file_name: None,
            kind: AttachmentKind::Photo,
        }
    }

    pub fn document(channel: &str, file_id: &str, file_name: Option<&str>) -> Self {
        Self {
            channel: channel.to_string(),
            file_id: file_id.to_string(),
            file_name: file_name.map(String::from),
            kind: AttachmentKind::Document,
        }
    }
}

/// Downloads attachment bytes.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, AttachmentError>;
}

/// Routes fetches to the fetcher registered for the attachment's channel.
#[derive(Default)]
pub struct FetcherRegistry {
    fetchers: HashMap<String, Arc<dyn AttachmentFetcher>>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: &str, fetcher: Arc<dyn AttachmentFetcher>) {
        self.fetchers.insert(channel.to_string(), fetcher);
    }
}

#[async_trait]
impl AttachmentFetcher for FetcherRegistry {
    async fn fetch(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, AttachmentError> {
        let fetcher =
            self.fetchers
                .get(&attachment.channel)
                .ok_or_else(|| AttachmentError::Resolve {
                    file_id: attachment.file_id.clone(),
                    reason: format!("no fetcher for channel {}", attachment.channel),
                })?;
        fetcher.fetch(attachment).await
    }
}

/// Stores fetched attachments under `<root>/<user_id>/`.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` for `field` and return the stored path as a `FileRef`.
    /// Re-uploads for the same field overwrite the previous file.
    pub async fn save(
        &self,
        user_id: &str,
        field: FileField,
        attachment: &AttachmentRef,
        bytes: &[u8],
    ) -> Result<FileRef, AttachmentError> {
        if bytes.is_empty() {
            return Err(AttachmentError::Empty);
        }

        let dir = self.root.join(sanitize(user_id));
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(file_name_for(field, attachment));
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(
            user_id,
            field = field.stem(),
            size = bytes.len(),
            "Attachment stored"
        );
        Ok(FileRef(path.to_string_lossy().into_owned()))
    }
}

/// Photos are stored as `<stem>.jpg`; documents keep their original name
/// behind the stem.
fn file_name_for(field: FileField, attachment: &AttachmentRef) -> String {
    match (attachment.kind, attachment.file_name.as_deref()) {
        (AttachmentKind::Document, Some(name)) if !sanitize(name).is_empty() => {
            format!("{}_{}", field.stem(), sanitize(name))
        }
        (AttachmentKind::Document, _) => format!("{}.bin", field.stem()),
        (AttachmentKind::Photo, _) => format!("{}.jpg", field.stem()),
    }
}

/// Keep a path component to a safe character set.
fn sanitize(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    base.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticFetcher(Vec<u8>);

    #[async_trait]
    impl AttachmentFetcher for StaticFetcher {
        async fn fetch(&self, _attachment: &AttachmentRef) -> Result<Vec<u8>, AttachmentError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn photo_and_document_names() {
        let photo = AttachmentRef::photo("telegram", "f1");
        assert_eq!(file_name_for(FileField::Photo3x4, &photo), "photo_3x4.jpg");

        let doc = AttachmentRef::document("telegram", "f2", Some("скан диплома.pdf"));
        assert_eq!(file_name_for(FileField::Diploma, &doc), "diploma_скандиплома.pdf");

        let unnamed = AttachmentRef::document("telegram", "f3", None);
        assert_eq!(file_name_for(FileField::MedicalBookFile, &unnamed), "medical_book.bin");
    }

    #[test]
    fn sanitize_strips_traversal() {
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize(".hidden"), "hidden");
        assert_eq!(sanitize("12345"), "12345");
    }

    #[tokio::test]
    async fn save_writes_under_user_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path());
        let att = AttachmentRef::photo("telegram", "f1");

        let file = store
            .save("42", FileField::PassportPhoto, &att, b"jpeg-bytes")
            .await
            .unwrap();

        let expected = dir.path().join("42").join("passport_photo.jpg");
        assert_eq!(file.0, expected.to_string_lossy());
        assert_eq!(std::fs::read(expected).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn save_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path());
        let att = AttachmentRef::photo("telegram", "f1");
        let err = store
            .save("42", FileField::Photo3x4, &att, b"")
            .await
            .unwrap_err();
        assert!(matches!(err, AttachmentError::Empty));
    }

    #[tokio::test]
    async fn registry_routes_by_channel() {
        let mut registry = FetcherRegistry::new();
        registry.register("cli", Arc::new(StaticFetcher(b"abc".to_vec())));

        let bytes = registry
            .fetch(&AttachmentRef::photo("cli", "x"))
            .await
            .unwrap();
        assert_eq!(bytes, b"abc");

        let err = registry
            .fetch(&AttachmentRef::photo("telegram", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AttachmentError::Resolve { .. }));
    }
}
