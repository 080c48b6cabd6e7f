//! Domain methods for the Cesium ion API client.
//!
//! Request and response types live in `tilepush_core::models`.

use crate::{check_status, ApiClient, ApiError, Auth};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::Deserialize;
use tilepush_core::models::{
    ArchiveFormat, ArchiveId, ArchiveInfo, ArchiveList, AssetId, AssetInfo, AssetList,
    CompletionNotice, CreateArchiveRequest, CreateAssetRequest, CreateAssetResponse,
};

/// Archive content as a byte stream.
pub struct ArchiveDownload {
    pub content_length: Option<u64>,
    pub stream: BoxStream<'static, Result<Bytes, ApiError>>,
}

impl std::fmt::Debug for ArchiveDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveDownload")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// JSON body some download endpoints return instead of redirecting.
#[derive(Deserialize)]
struct DownloadLink {
    url: String,
}

impl ApiClient {
    /// Register a new asset. Returns the upload location and completion notice.
    pub async fn create_asset(
        &self,
        request: &CreateAssetRequest,
    ) -> Result<CreateAssetResponse, ApiError> {
        self.post_json("/v1/assets", request).await
    }

    pub async fn get_asset(&self, asset_id: AssetId) -> Result<AssetInfo, ApiError> {
        self.get(&format!("/v1/assets/{}", asset_id), &[]).await
    }

    pub async fn list_assets(&self) -> Result<Vec<AssetInfo>, ApiError> {
        let list: AssetList = self.get("/v1/assets", &[]).await?;
        Ok(list.items)
    }

    /// Invoke the completion notice returned by `create_asset`.
    pub async fn complete_upload(&self, notice: &CompletionNotice) -> Result<(), ApiError> {
        let method = Method::from_bytes(notice.method.to_uppercase().as_bytes())
            .map_err(|_| ApiError::Config(format!("invalid method {:?}", notice.method)))?;

        let mut request = self.request(method, &notice.url);
        if !notice.fields.is_null() {
            request = request.json(&notice.fields);
        }

        check_status(request.send().await?).await?;
        Ok(())
    }

    pub async fn create_archive(
        &self,
        asset_ids: Vec<AssetId>,
        format: ArchiveFormat,
    ) -> Result<ArchiveInfo, ApiError> {
        let request = CreateArchiveRequest::for_assets(asset_ids, format);
        self.post_json("/v1/archives", &request).await
    }

    pub async fn get_archive(&self, archive_id: ArchiveId) -> Result<ArchiveInfo, ApiError> {
        self.get(&format!("/v1/archives/{}", archive_id), &[]).await
    }

    pub async fn list_archives(&self) -> Result<Vec<ArchiveInfo>, ApiError> {
        let list: ArchiveList = self.get("/v1/archives", &[]).await?;
        Ok(list.items)
    }

    /// Open a byte stream over a finished archive.
    ///
    /// Redirects are followed by the HTTP client. If the endpoint answers with
    /// JSON carrying a `url`, that URL is presigned and fetched without
    /// credentials. The body is not subject to the metadata timeout.
    pub async fn download_archive(&self, archive_id: ArchiveId) -> Result<ArchiveDownload, ApiError> {
        let url = self.build_url(&format!("/v1/archives/{}/download", archive_id));
        let response = self.open_stream(&url, self.auth()).await?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        let response = if is_json {
            let bytes = response.bytes().await?;
            let link: DownloadLink =
                serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))?;
            tracing::debug!(archive_id, "Following archive download link");
            self.open_stream(&link.url, &Auth::None).await?
        } else {
            response
        };

        let content_length = response.content_length();
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed();

        Ok(ArchiveDownload {
            content_length,
            stream,
        })
    }
}
