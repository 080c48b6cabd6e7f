use crate::keys::object_key;
use crate::traits::{ObjectUploader, StorageError, StorageResult, UploadReceipt};
use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::buffered::BufWriter;
use object_store::path::Path as ObjectPath;
use object_store::RetryConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tilepush_core::models::UploadLocation;
use tokio::io::AsyncWriteExt;

/// Region the tiling service's upload buckets live in.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Bytes buffered before the writer switches to a multipart upload.
pub const MULTIPART_THRESHOLD: usize = 10 * 1024 * 1024;

/// S3 uploader using per-asset session credentials
///
/// A fresh client is built for every upload because each asset comes with its
/// own short-lived credentials.
#[derive(Clone, Debug)]
pub struct S3Uploader {
    region: String,
}

impl Default for S3Uploader {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

impl S3Uploader {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    /// Build an S3 client scoped to the credentials in `location`. Requests
    /// are sent once; a failure surfaces to the caller.
    pub fn store_for(&self, location: &UploadLocation) -> StorageResult<AmazonS3> {
        let mut builder = AmazonS3Builder::new()
            .with_region(self.region.clone())
            .with_bucket_name(location.bucket.clone())
            .with_access_key_id(location.access_key.clone())
            .with_secret_access_key(location.secret_access_key.clone())
            .with_token(location.session_token.clone())
            .with_retry(RetryConfig {
                max_retries: 0,
                ..Default::default()
            });

        if let Some(ref endpoint) = location.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))
    }
}

#[async_trait]
impl ObjectUploader for S3Uploader {
    async fn upload(
        &self,
        file_path: &Path,
        location: &UploadLocation,
    ) -> StorageResult<UploadReceipt> {
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::InvalidKey(file_path.display().to_string()))?;
        let key = object_key(&location.prefix, &filename)?;

        let mut file = tokio::fs::File::open(file_path).await?;
        let store = Arc::new(self.store_for(location)?);
        let object = ObjectPath::from(key.clone());

        let start = Instant::now();

        // Small files go out as one PUT on shutdown, larger ones as multipart parts.
        let mut writer = BufWriter::with_capacity(store, object, MULTIPART_THRESHOLD);
        let written = match tokio::io::copy(&mut file, &mut writer).await {
            Ok(n) => writer.shutdown().await.map(|_| n),
            Err(e) => Err(e),
        };

        let size = match written {
            Ok(n) => n,
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(error = %abort_err, key = %key, "Failed to abort multipart upload");
                }
                tracing::error!(
                    error = %e,
                    bucket = %location.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                return Err(StorageError::UploadFailed(e.to_string()));
            }
        };

        tracing::info!(
            bucket = %location.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(UploadReceipt {
            bucket: location.bucket.clone(),
            key,
            size_bytes: size,
            duration: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(endpoint: Option<&str>) -> UploadLocation {
        UploadLocation {
            endpoint: endpoint.map(str::to_string),
            bucket: "assets-bucket".to_string(),
            prefix: "sources/42/".to_string(),
            access_key: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: "session".to_string(),
        }
    }

    #[test]
    fn test_store_builds_with_session_credentials() {
        let uploader = S3Uploader::default();
        assert!(uploader.store_for(&location(None)).is_ok());
        assert!(uploader
            .store_for(&location(Some("https://s3.amazonaws.com/")))
            .is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = S3Uploader::default();
        let err = uploader
            .upload(&dir.path().join("absent.gml"), &location(None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::IoError(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_reported_after_one_put() {
        let mut server = mockito::Server::new_async().await;
        let put = server
            .mock("PUT", mockito::Matcher::Any)
            .with_status(500)
            .with_body("internal error")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("building.gml");
        std::fs::write(&file, b"<CityModel/>").unwrap();

        let uploader = S3Uploader::default();
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            uploader.upload(&file, &location(Some(&server.url()))),
        )
        .await
        .expect("upload should not keep retrying");

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
        put.assert_async().await;
    }

    #[tokio::test]
    async fn test_small_file_is_sent_as_single_put() {
        let mut server = mockito::Server::new_async().await;
        let put = server
            .mock("PUT", "/assets-bucket/sources/42/building.gml")
            .with_status(200)
            .with_header("etag", "\"abc\"")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("building.gml");
        std::fs::write(&file, b"<CityModel/>").unwrap();

        let receipt = S3Uploader::default()
            .upload(&file, &location(Some(&server.url())))
            .await
            .unwrap();

        put.assert_async().await;
        assert_eq!(receipt.key, "sources/42/building.gml");
        assert_eq!(receipt.size_bytes, 12);
    }
}
