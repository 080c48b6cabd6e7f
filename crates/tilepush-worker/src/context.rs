//! Remote service seam for the workflow
//!
//! The workflow talks to the tiling service only through `AssetService`.
//! `ApiClient` implements it for real runs; tests plug in in-memory fakes.

use async_trait::async_trait;

use tilepush_api_client::{ApiClient, ApiError, ArchiveDownload};
use tilepush_core::models::{
    ArchiveFormat, ArchiveId, ArchiveInfo, AssetId, AssetInfo, CompletionNotice,
    CreateAssetRequest, CreateAssetResponse,
};

/// Operations the upload workflow needs from the tiling service.
#[async_trait]
pub trait AssetService: Send + Sync {
    async fn create_asset(
        &self,
        request: &CreateAssetRequest,
    ) -> Result<CreateAssetResponse, ApiError>;

    async fn complete_upload(&self, notice: &CompletionNotice) -> Result<(), ApiError>;

    /// Must be side-effect free; it is called repeatedly while polling.
    async fn get_asset(&self, asset_id: AssetId) -> Result<AssetInfo, ApiError>;

    async fn create_archive(&self, asset_id: AssetId) -> Result<ArchiveInfo, ApiError>;

    async fn get_archive(&self, archive_id: ArchiveId) -> Result<ArchiveInfo, ApiError>;

    async fn download_archive(&self, archive_id: ArchiveId)
        -> Result<ArchiveDownload, ApiError>;
}

#[async_trait]
impl AssetService for ApiClient {
    async fn create_asset(
        &self,
        request: &CreateAssetRequest,
    ) -> Result<CreateAssetResponse, ApiError> {
        ApiClient::create_asset(self, request).await
    }

    async fn complete_upload(&self, notice: &CompletionNotice) -> Result<(), ApiError> {
        ApiClient::complete_upload(self, notice).await
    }

    async fn get_asset(&self, asset_id: AssetId) -> Result<AssetInfo, ApiError> {
        ApiClient::get_asset(self, asset_id).await
    }

    async fn create_archive(&self, asset_id: AssetId) -> Result<ArchiveInfo, ApiError> {
        ApiClient::create_archive(self, vec![asset_id], ArchiveFormat::Zip).await
    }

    async fn get_archive(&self, archive_id: ArchiveId) -> Result<ArchiveInfo, ApiError> {
        ApiClient::get_archive(self, archive_id).await
    }

    async fn download_archive(
        &self,
        archive_id: ArchiveId,
    ) -> Result<ArchiveDownload, ApiError> {
        ApiClient::download_archive(self, archive_id).await
    }
}
