// Filesystem-backed blob store: <root>/<client>/<filename>

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{sanitize_client, sanitize_filename, BlobKey, BlobStore};

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn client_dir(&self, client: &str) -> PathBuf {
        self.root.join(client)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &BlobKey) -> PathBuf {
        self.client_dir(key.client()).join(key.filename())
    }

    fn key_for_path(&self, path: &Path) -> Option<BlobKey> {
        let filename = path.file_name()?.to_str()?;
        let client_dir = path.parent()?;
        let client = client_dir.file_name()?.to_str()?;

        if client_dir.parent()? != self.root.as_path() {
            return None;
        }
        if sanitize_client(client) != client || sanitize_filename(filename) != filename {
            return None;
        }
        BlobKey::parse(client, filename).ok()
    }

    async fn save(&self, key: &BlobKey, bytes: &[u8]) -> io::Result<PathBuf> {
        let dir = self.client_dir(key.client());
        fs::create_dir_all(&dir).await?;

        let path = dir.join(key.filename());
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "Blob written");
        Ok(path)
    }

    async fn open(&self, key: &BlobKey) -> io::Result<Vec<u8>> {
        fs::read(self.path_for(key)).await
    }

    async fn delete(&self, key: &BlobKey) -> io::Result<()> {
        fs::remove_file(self.path_for(key)).await
    }

    async fn list(&self, client: &str) -> io::Result<Vec<String>> {
        let mut entries = fs::read_dir(self.client_dir(client)).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
