//! Document files on disk, under `upload_dir/<application id>/`.

use eligo_core::{ApplicationId, DocumentMeta};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stored names are generated by the core (`<id>.<ext>`), never taken
    /// from the client.
    #[must_use]
    pub fn path_for(&self, app: ApplicationId, meta: &DocumentMeta) -> PathBuf {
        self.root.join(app.0.to_string()).join(&meta.stored_name)
    }

    /// Write through a temporary file, then rename into place.
    pub async fn write(&self, app: ApplicationId, meta: &DocumentMeta, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(app, meta);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("part");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await
    }

    pub async fn read(&self, app: ApplicationId, meta: &DocumentMeta) -> io::Result<Vec<u8>> {
        fs::read(self.path_for(app, meta)).await
    }

    /// Remove a file. A missing file is not an error.
    pub async fn remove(&self, app: ApplicationId, meta: &DocumentMeta) -> io::Result<()> {
        match fs::remove_file(self.path_for(app, meta)).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eligo_core::documents::ContentType;
    use eligo_core::{DocumentId, DocumentKind};

    #[tokio::test]
    async fn write_read_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let uploads = UploadDir::new(dir.path());
        let bytes = b"%PDF-1.7 test";
        let meta = DocumentMeta::new(
            DocumentId(1),
            DocumentKind::Identity,
            "../../etc/passwd.pdf",
            ContentType::Pdf,
            bytes,
            Utc::now(),
        );

        uploads.write(ApplicationId(7), &meta, bytes).await.expect("writes");
        let path = uploads.path_for(ApplicationId(7), &meta);
        assert_eq!(path, dir.path().join("7").join("1.pdf"));
        assert_eq!(uploads.read(ApplicationId(7), &meta).await.expect("reads"), bytes);

        uploads.remove(ApplicationId(7), &meta).await.expect("removes");
        assert!(!path.exists());
        uploads.remove(ApplicationId(7), &meta).await.expect("idempotent");
    }
}
