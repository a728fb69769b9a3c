// Blob storage keyed by (client, filename)

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::{AppError, AppResult};

pub mod local;

pub use local::*;

/// Strip everything outside `[A-Za-z0-9_-]` from a client identifier.
pub fn sanitize_client(client: &str) -> String {
    client
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Reduce a filename to its final path component.
///
/// `"../../etc/passwd"` becomes `"passwd"`. Names that do not denote a file
/// (`""`, `"."`, `".."`, `"dir/"` with nothing after the slash) come back empty.
pub fn sanitize_filename(filename: &str) -> String {
    let is_sep = |c: char| c == '/' || c == '\\';
    let base = filename
        .trim_end_matches(is_sep)
        .rsplit(is_sep)
        .next()
        .unwrap_or("");
    match base {
        "." | ".." => String::new(),
        other => other.to_string(),
    }
}

/// A sanitized, non-empty (client, filename) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    client: String,
    filename: String,
}

impl BlobKey {
    pub fn parse(client: &str, filename: &str) -> AppResult<Self> {
        let client = sanitize_client(client);
        let filename = sanitize_filename(filename);
        if client.is_empty() || filename.is_empty() {
            return Err(AppError::Validation(
                "client and filename required".to_string(),
            ));
        }
        Ok(Self { client, filename })
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Byte storage for tenant files. Implementations must confine every key to
/// its client's namespace.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn root(&self) -> &Path;

    /// Where `key` lives on the backing store.
    fn path_for(&self, key: &BlobKey) -> PathBuf;

    /// Inverse of [`BlobStore::path_for`]. `None` unless `path` sits directly
    /// inside a client directory under the root and both components are
    /// already sanitized.
    fn key_for_path(&self, path: &Path) -> Option<BlobKey>;

    /// Write `bytes`, replacing any previous content. Returns the stored path.
    async fn save(&self, key: &BlobKey, bytes: &[u8]) -> io::Result<PathBuf>;

    async fn open(&self, key: &BlobKey) -> io::Result<Vec<u8>>;

    async fn delete(&self, key: &BlobKey) -> io::Result<()>;

    /// Filenames stored for `client`, sorted.
    async fn list(&self, client: &str) -> io::Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_client_strips_disallowed_characters() {
        assert_eq!(sanitize_client("a/b;c"), "abc");
        assert_eq!(sanitize_client("acme_corp-01"), "acme_corp-01");
        assert_eq!(sanitize_client("../.."), "");
        assert_eq!(sanitize_client("héllo wörld"), "hllowrld");
    }

    #[test]
    fn test_sanitize_filename_keeps_last_component() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("photos/cat.png"), "cat.png");
        assert_eq!(sanitize_filename("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_filename("dir/"), "dir");
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }

    #[test]
    fn test_sanitize_filename_rejects_dot_entries() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("."), "");
        assert_eq!(sanitize_filename(".."), "");
        assert_eq!(sanitize_filename("a/.."), "");
        assert_eq!(sanitize_filename("///"), "");
    }

    #[test]
    fn test_blob_key_requires_both_parts() {
        assert!(matches!(
            BlobKey::parse("", "a.txt"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            BlobKey::parse("acme", ".."),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            BlobKey::parse(";;;", "a.txt"),
            Err(AppError::Validation(_))
        ));

        let key = BlobKey::parse("ac/me", "../../etc/passwd").unwrap();
        assert_eq!(key.client(), "acme");
        assert_eq!(key.filename(), "passwd");
    }
}
