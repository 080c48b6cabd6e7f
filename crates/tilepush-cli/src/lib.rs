use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tilepush_core::models::{ArchiveInfo, AssetId, AssetInfo, AssetStatus};

/// How many asset ids the follow-up hint shows.
pub const HINT_ID_COUNT: usize = 3;

/// Initialize tracing for the CLI. Logs go to stderr, or to `log_file` when
/// given; `json` switches to one JSON object per line.
pub fn init_tracing(log_file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (writer, ansi) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Files directly inside `dir` whose extension matches `extension`
/// (case-insensitive, without the dot), sorted by path.
pub fn discover_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.').to_lowercase();
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase() == wanted)
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Marker shown next to an asset status.
pub fn status_marker(status: &AssetStatus) -> &'static str {
    match status {
        AssetStatus::Complete => "✅",
        AssetStatus::Error => "❌",
        AssetStatus::DataError => "🚨",
        AssetStatus::InProgress => "⏳",
        AssetStatus::AwaitingFiles => "📋",
        AssetStatus::NotStarted => "⏸️",
        AssetStatus::Other(s) if s.eq_ignore_ascii_case("UPLOAD_COMPLETE") => "📤",
        AssetStatus::Other(_) => "❓",
    }
}

/// Multi-line description of one asset.
pub fn format_asset_info(asset: &AssetInfo) -> String {
    let mut lines = vec![
        format!("Asset ID: {}", asset.id),
        format!("Name: {}", asset.name.as_deref().unwrap_or("Unnamed")),
        format!("Type: {}", asset.asset_type.as_deref().unwrap_or("Unknown")),
        format!("Status: {}", asset.status),
        format!(
            "Date Added: {}",
            asset
                .date_added
                .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "Unknown".to_string())
        ),
    ];
    if let Some(percent) = asset.percent_complete {
        lines.push(format!("Progress: {}%", percent));
    }
    if let Some(description) = asset.description.as_deref() {
        lines.push(format!("Description: {}", description));
    }
    lines.join("\n")
}

/// One-line summary: marker, name, status and progress if known.
pub fn format_asset_line(asset: &AssetInfo) -> String {
    let progress = asset
        .percent_complete
        .map(|p| format!(" ({}%)", p))
        .unwrap_or_default();
    format!(
        "{} {}: {}{}",
        status_marker(&asset.status),
        truncate_string(asset.name.as_deref().unwrap_or("Unnamed"), 60),
        asset.status,
        progress
    )
}

pub fn format_archive_info(archive: &ArchiveInfo) -> String {
    let asset_ids = archive
        .asset_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "  • Archive ID: {}\n    Name: {}\n    Status: {}\n    Format: {:?}\n    Assets: {}\n    Size: {:.2} MB",
        archive.id,
        archive.name.as_deref().unwrap_or("Unnamed"),
        archive.status,
        archive.format,
        if asset_ids.is_empty() { "-".to_string() } else { asset_ids },
        archive.size_mb()
    )
}

/// Newest first by date added; undated assets last. Keeps at most `limit`.
pub fn recent_assets(mut assets: Vec<AssetInfo>, limit: usize) -> Vec<AssetInfo> {
    assets.sort_by(|a, b| b.date_added.cmp(&a.date_added));
    assets.truncate(limit);
    assets
}

/// Command suggested after an upload that did not wait for processing.
pub fn follow_up_hint(asset_ids: &[AssetId]) -> Option<String> {
    if asset_ids.is_empty() {
        return None;
    }
    let shown: Vec<String> = asset_ids
        .iter()
        .take(HINT_ID_COUNT)
        .map(|id| id.to_string())
        .collect();
    let mut hint = format!("tilepush status {}", shown.join(" "));
    if asset_ids.len() > HINT_ID_COUNT {
        hint.push_str(&format!(
            "\n   (showing first {} of {} assets)",
            HINT_ID_COUNT,
            asset_ids.len()
        ));
    }
    Some(hint)
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn asset(value: serde_json::Value) -> AssetInfo {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_multibyte() {
        assert_eq!(truncate_string("Straße_Nord", 7), "Stra...");
    }

    #[test]
    fn discover_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.gml", "a.GML", "c.txt", "d.gml.bak"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.gml")).unwrap();

        let files = discover_files(dir.path(), "gml").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.GML", "b.gml"]);
    }

    #[test]
    fn discover_files_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_files(dir.path(), ".gml").unwrap().is_empty());
    }

    #[test]
    fn status_markers() {
        assert_eq!(status_marker(&AssetStatus::Complete), "✅");
        assert_eq!(status_marker(&AssetStatus::DataError), "🚨");
        assert_eq!(status_marker(&AssetStatus::Other("WHATEVER".into())), "❓");
    }

    #[test]
    fn asset_info_includes_optional_fields() {
        let info = format_asset_info(&asset(json!({
            "id": 12345,
            "name": "berlin",
            "type": "3DTILES",
            "status": "IN_PROGRESS",
            "percentComplete": 42,
            "dateAdded": "2024-05-01T10:00:00Z",
            "description": "Uploaded GML file: berlin.gml"
        })));
        assert!(info.contains("Asset ID: 12345"));
        assert!(info.contains("Date Added: 2024-05-01 10:00:00 UTC"));
        assert!(info.contains("Progress: 42%"));
        assert!(info.contains("Description: Uploaded GML file: berlin.gml"));
    }

    #[test]
    fn recent_assets_newest_first() {
        let assets = vec![
            asset(json!({ "id": 1, "status": "COMPLETE", "dateAdded": "2024-01-01T00:00:00Z" })),
            asset(json!({ "id": 2, "status": "COMPLETE" })),
            asset(json!({ "id": 3, "status": "COMPLETE", "dateAdded": "2024-03-01T00:00:00Z" })),
        ];
        let ids: Vec<_> = recent_assets(assets, 2).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn hint_shows_first_three_ids() {
        assert_eq!(follow_up_hint(&[]), None);
        assert_eq!(follow_up_hint(&[1, 2]).unwrap(), "tilepush status 1 2");
        let hint = follow_up_hint(&[1, 2, 3, 4, 5]).unwrap();
        assert!(hint.starts_with("tilepush status 1 2 3\n"));
        assert!(hint.contains("first 3 of 5"));
    }
}
