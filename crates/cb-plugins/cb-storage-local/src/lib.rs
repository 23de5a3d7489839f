//! # cb-storage-local
//! church-board/crates/cb-plugins/cb-storage-local/src/lib.rs
//! Local filesystem implementation of `MediaStore`.
//! Files live under a public asset root that the web server serves as-is,
//! so a file URL such as `/uploads/gallery/x.jpg` is also its relative path.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::bail;
use async_trait::async_trait;
use cb_core::traits::MediaStore;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: usize = 5;

pub struct LocalMediaStore {
    /// Public asset root (e.g., "./public")
    root_path: PathBuf,
    /// Directory under the root receiving new uploads (e.g., "uploads")
    upload_dir: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, upload_dir: impl Into<String>) -> Self {
        Self { root_path: root, upload_dir: upload_dir.into() }
    }

    /// Maps a public URL onto a path under the root, refusing anything that
    /// could escape it.
    fn resolve(&self, file_url: &str) -> anyhow::Result<PathBuf> {
        let relative = file_url.trim_start_matches('/');
        let mut path = self.root_path.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => bail!("file url {file_url:?} escapes the public root"),
            }
        }
        if path == self.root_path {
            bail!("file url {file_url:?} does not name a file");
        }
        Ok(path)
    }
}

/// `<millis>_<random>.<ext>`, keeping a short alphanumeric extension from
/// the original name so the web server can infer the content type.
fn unique_name(original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    let random = Uuid::new_v4().simple().to_string();
    format!("{}_{}{}", Utc::now().timestamp_millis(), &random[..12], extension)
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn read(&self, file_url: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.resolve(file_url)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates the file with create-new semantics, so two concurrent uploads
    /// can never overwrite each other even if their generated names collide.
    async fn save_upload(&self, folder: &str, original_name: &str, data: &[u8]) -> anyhow::Result<String> {
        let folder = folder.trim_matches('/');
        let url_dir = if folder.is_empty() {
            format!("/{}", self.upload_dir)
        } else {
            format!("/{}/{}", self.upload_dir, folder)
        };

        // Resolving a placeholder name validates the folder before touching disk.
        let dir = self
            .resolve(&format!("{url_dir}/placeholder"))?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root_path.clone());
        fs::create_dir_all(&dir).await?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = unique_name(original_name);
            let target = dir.join(&name);
            let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&target).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(data).await?;
            file.flush().await?;
            log::debug!("stored {} bytes at {}", data.len(), target.display());
            return Ok(format!("{url_dir}/{name}"));
        }

        bail!("could not find a free file name in {}", dir.display())
    }

    async fn delete(&self, file_url: &str) -> anyhow::Result<()> {
        let path = self.resolve(file_url)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
