use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::models::{ArchiveId, AssetId};

/// Archive build status. A freshly created archive without a reported
/// status is treated as in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArchiveStatus {
    #[default]
    InProgress,
    Complete,
    Error,
    Other(String),
}

impl ArchiveStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ArchiveStatus::InProgress => "IN_PROGRESS",
            ArchiveStatus::Complete => "COMPLETE",
            ArchiveStatus::Error => "ERROR",
            ArchiveStatus::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for ArchiveStatus {
    fn from(s: String) -> Self {
        match s.to_uppercase().as_str() {
            "IN_PROGRESS" => ArchiveStatus::InProgress,
            "COMPLETE" => ArchiveStatus::Complete,
            "ERROR" => ArchiveStatus::Error,
            _ => ArchiveStatus::Other(s),
        }
    }
}

impl From<ArchiveStatus> for String {
    fn from(status: ArchiveStatus) -> Self {
        status.as_str().to_string()
    }
}

impl Display for ArchiveStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArchiveFormat {
    #[default]
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
        }
    }
}

/// Body of `POST /v1/archives`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArchiveRequest {
    pub asset_ids: Vec<AssetId>,
    pub format: ArchiveFormat,
    #[serde(rename = "type")]
    pub archive_type: String,
}

impl CreateArchiveRequest {
    pub fn for_assets(asset_ids: Vec<AssetId>, format: ArchiveFormat) -> Self {
        Self {
            asset_ids,
            format,
            archive_type: "FULL".to_string(),
        }
    }
}

/// Archive record as returned by the archive endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveInfo {
    pub id: ArchiveId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: ArchiveStatus,
    #[serde(default)]
    pub format: ArchiveFormat,
    #[serde(default)]
    pub asset_ids: Vec<AssetId>,
    #[serde(default)]
    pub bytes_archived: Option<u64>,
    #[serde(default)]
    pub date_added: Option<DateTime<Utc>>,
}

impl ArchiveInfo {
    /// File name to save the archive under, before sanitizing.
    pub fn file_name(&self) -> String {
        let stem = self
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("archive_{}", self.id));
        let ext = self.format.extension();
        if stem.to_lowercase().ends_with(&format!(".{}", ext)) {
            stem
        } else {
            format!("{}.{}", stem, ext)
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.bytes_archived.unwrap_or(0) as f64 / (1024.0 * 1024.0)
    }
}

/// Response of `GET /v1/archives`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveList {
    #[serde(alias = "archives", default)]
    pub items: Vec<ArchiveInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_archive_info_deserializes() {
        let info: ArchiveInfo = serde_json::from_value(json!({
            "id": 77,
            "status": "IN_PROGRESS",
            "format": "ZIP",
            "assetIds": [12345]
        }))
        .unwrap();
        assert_eq!(info.status, ArchiveStatus::InProgress);
        assert_eq!(info.asset_ids, vec![12345]);
    }

    #[test]
    fn test_bare_create_response_is_in_progress() {
        let info: ArchiveInfo = serde_json::from_value(json!({ "id": 3 })).unwrap();
        assert_eq!(info.status, ArchiveStatus::InProgress);
    }

    #[test]
    fn test_file_name_falls_back_to_id() {
        let info: ArchiveInfo =
            serde_json::from_value(json!({ "id": 9, "status": "COMPLETE" })).unwrap();
        assert_eq!(info.file_name(), "archive_9.zip");
    }

    #[test]
    fn test_file_name_keeps_existing_extension() {
        let info: ArchiveInfo = serde_json::from_value(
            json!({ "id": 9, "name": "Block7.ZIP", "status": "COMPLETE" }),
        )
        .unwrap();
        assert_eq!(info.file_name(), "Block7.ZIP");
    }

    #[test]
    fn test_create_request_shape() {
        let value =
            serde_json::to_value(CreateArchiveRequest::for_assets(vec![5], ArchiveFormat::Zip))
                .unwrap();
        assert_eq!(value, json!({ "assetIds": [5], "format": "ZIP", "type": "FULL" }));
    }
}
