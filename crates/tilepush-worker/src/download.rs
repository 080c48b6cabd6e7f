//! Saving downloaded archives to the output directory.
//!
//! Names are sanitized and never overwrite an existing file: the first free
//! name among `name.ext`, `name_1.ext`, `name_2.ext`, … is claimed atomically
//! with `create_new`, so concurrent tasks cannot collide.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tilepush_api_client::{ApiError, ArchiveDownload};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Give up after this many taken names.
const MAX_SUFFIX: u32 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] ApiError),

    #[error("No free file name for {0}")]
    NoFreeName(String),
}

/// A file written to disk.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_` and strip leading dots.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "archive".to_string()
    } else {
        cleaned
    }
}

fn candidate(dir: &Path, stem: &str, ext: Option<&str>, n: u32) -> PathBuf {
    let name = match (n, ext) {
        (0, Some(ext)) => format!("{}.{}", stem, ext),
        (0, None) => stem.to_string(),
        (n, Some(ext)) => format!("{}_{}.{}", stem, n, ext),
        (n, None) => format!("{}_{}", stem, n),
    };
    dir.join(name)
}

/// Create a new, previously absent file for `file_name` inside `dir`.
pub async fn claim_unique_path(dir: &Path, file_name: &str) -> Result<(PathBuf, File), DownloadError> {
    let file_name = sanitize_file_name(file_name);
    let as_path = Path::new(&file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());
    let ext = as_path.extension().map(|e| e.to_string_lossy().into_owned());

    for n in 0..MAX_SUFFIX {
        let path = candidate(dir, &stem, ext.as_deref(), n);
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(DownloadError::NoFreeName(file_name))
}

/// Stream `download` into a fresh file in `dir`. A partial file is removed on failure.
pub async fn save_download(
    download: ArchiveDownload,
    dir: &Path,
    file_name: &str,
) -> Result<SavedFile, DownloadError> {
    fs::create_dir_all(dir).await?;
    let (path, mut file) = claim_unique_path(dir, file_name).await?;

    let mut stream = download.stream;
    let mut written: u64 = 0;
    let result: Result<(), DownloadError> = async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        drop(file);
        if let Err(remove_err) = fs::remove_file(&path).await {
            tracing::warn!(error = %remove_err, path = %path.display(), "Failed to remove partial download");
        }
        return Err(e);
    }

    tracing::info!(path = %path.display(), size_bytes = written, "Archive saved");

    Ok(SavedFile {
        path,
        bytes: written,
    })
}
