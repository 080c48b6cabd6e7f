//! Object key construction for asset source uploads.
//!
//! The service hands out a prefix per asset (e.g. `sources/12345/`); the file
//! lands directly under it as `{prefix}{filename}`.

use crate::traits::{StorageError, StorageResult};

/// Build the object key for `filename` under the asset's `prefix`.
///
/// The prefix is used verbatim apart from any leading `/`. The filename must be
/// a single path component.
pub fn object_key(prefix: &str, filename: &str) -> StorageResult<String> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename == "."
        || filename == ".."
    {
        return Err(StorageError::InvalidKey(format!(
            "not a plain file name: {:?}",
            filename
        )));
    }

    if prefix.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "prefix escapes its root: {:?}",
            prefix
        )));
    }

    Ok(format!("{}{}", prefix.trim_start_matches('/'), filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_prefix_plus_filename() {
        assert_eq!(
            object_key("sources/12345/", "building.gml").unwrap(),
            "sources/12345/building.gml"
        );
    }

    #[test]
    fn test_leading_slash_is_dropped() {
        assert_eq!(object_key("/sources/1/", "a.gml").unwrap(), "sources/1/a.gml");
    }

    #[test]
    fn test_rejects_path_like_filenames() {
        assert!(object_key("sources/1/", "../a.gml").is_err());
        assert!(object_key("sources/1/", "dir/a.gml").is_err());
        assert!(object_key("sources/1/", "").is_err());
        assert!(object_key("sources/../1/", "a.gml").is_err());
    }
}
