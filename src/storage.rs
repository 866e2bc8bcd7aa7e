//! Flat-directory storage for uploaded campaign documents.
use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::info;

/// Per-file upload cap (10 MiB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// URL prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File for '{field}' exceeds the {limit} byte limit")]
    TooLarge { field: String, limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under a fresh unique name and returns the public
    /// reference (`/uploads/<name>`).
    pub async fn store(
        &self,
        field: &str,
        original_filename: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        if bytes.len() > MAX_FILE_SIZE {
            return Err(StorageError::TooLarge {
                field: field.to_string(),
                limit: MAX_FILE_SIZE,
            });
        }

        tokio::fs::create_dir_all(&self.root).await?;

        let name = unique_file_name(field, original_filename);
        tokio::fs::write(self.root.join(&name), bytes).await?;

        info!(file = %name, size = bytes.len(), "Stored upload");
        Ok(format!("{}/{}", PUBLIC_PREFIX, name))
    }
}

/// `<field>-<unix millis>-<random>.<ext>`; the extension is kept only when it
/// is plain alphanumeric.
fn unique_file_name(field: &str, original_filename: Option<&str>) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);

    let extension = original_filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match extension {
        Some(ext) => format!("{}-{}-{}.{}", field, timestamp, suffix, ext),
        None => format!("{}-{}-{}", field, timestamp, suffix),
    }
}
