use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::models::AssetId;

/// Processing status reported by the tiling service for an asset.
///
/// Statuses the client does not know are kept verbatim in `Other` and
/// treated as still pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetStatus {
    AwaitingFiles,
    NotStarted,
    InProgress,
    Complete,
    Error,
    DataError,
    Other(String),
}

impl AssetStatus {
    /// `ERROR` and `DATA_ERROR` are hard processing failures.
    pub fn is_error(&self) -> bool {
        matches!(self, AssetStatus::Error | AssetStatus::DataError)
    }

    /// No further automatic change is expected once an asset is here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssetStatus::Complete) || self.is_error()
    }

    pub fn as_str(&self) -> &str {
        match self {
            AssetStatus::AwaitingFiles => "AWAITING_FILES",
            AssetStatus::NotStarted => "NOT_STARTED",
            AssetStatus::InProgress => "IN_PROGRESS",
            AssetStatus::Complete => "COMPLETE",
            AssetStatus::Error => "ERROR",
            AssetStatus::DataError => "DATA_ERROR",
            AssetStatus::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for AssetStatus {
    fn from(s: String) -> Self {
        match s.to_uppercase().as_str() {
            "AWAITING_FILES" => AssetStatus::AwaitingFiles,
            "NOT_STARTED" => AssetStatus::NotStarted,
            "IN_PROGRESS" => AssetStatus::InProgress,
            "COMPLETE" => AssetStatus::Complete,
            "ERROR" => AssetStatus::Error,
            "DATA_ERROR" => AssetStatus::DataError,
            _ => AssetStatus::Other(s),
        }
    }
}

impl From<AssetStatus> for String {
    fn from(status: AssetStatus) -> Self {
        status.as_str().to_string()
    }
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Asset record as returned by `GET /v1/assets/{id}` and inside listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub id: AssetId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub asset_type: Option<String>,
    pub status: AssetStatus,
    #[serde(default)]
    pub percent_complete: Option<f64>,
    #[serde(default)]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

/// Response of `GET /v1/assets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetList {
    #[serde(alias = "assets", default)]
    pub items: Vec<AssetInfo>,
}

/// Tiling options sent with a CityGML source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    pub source_type: String,
    pub geometry_compression: String,
    pub texture_format: String,
}

impl ProcessingOptions {
    /// Fixed options for CityGML input.
    pub fn citygml() -> Self {
        Self {
            source_type: "CITYGML".to_string(),
            geometry_compression: "DRACO".to_string(),
            texture_format: "AUTO".to_string(),
        }
    }
}

/// Body of `POST /v1/assets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssetRequest {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub options: ProcessingOptions,
}

impl CreateAssetRequest {
    /// Request for a 3D Tiles asset built from one CityGML file.
    pub fn citygml(name: impl Into<String>, file_name: &str) -> Self {
        Self {
            name: name.into(),
            description: format!("Uploaded GML file: {}", file_name),
            asset_type: "3DTILES".to_string(),
            options: ProcessingOptions::citygml(),
        }
    }
}

/// Temporary object-storage destination and credentials for one asset.
///
/// Single use: owned by the task that created the asset.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLocation {
    #[serde(default)]
    pub endpoint: Option<String>,
    pub bucket: String,
    pub prefix: String,
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl std::fmt::Debug for UploadLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("UploadLocation")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Request the service expects once the object-storage transfer is done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub fields: serde_json::Value,
}

/// Response of `POST /v1/assets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetResponse {
    pub asset_metadata: AssetInfo,
    pub upload_location: UploadLocation,
    pub on_complete: CompletionNotice,
}
