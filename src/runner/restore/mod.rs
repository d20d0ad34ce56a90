//! Restore runners: scan a backup folder and queue one job per stored
//! top-level resource.
//!
//! Files are grouped by the directory they live in, which is named after the
//! numeric ID of the resource:
//!
//! ```text
//! <backup>/products/8737843216608/product.json
//!                                /product_metafields.json
//!                                /product_variants.json
//!                                /product_media.json
//! ```

pub mod customer;
pub mod filter;
pub mod handler;
pub mod product;

pub use customer::CustomerRunner;
pub use filter::RestoreFilter;
pub use handler::RestoreOptions;
pub use product::ProductRunner;

use super::RunnerError;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Stored files per resource ID, keyed by file stem.
pub(crate) type Groups = BTreeMap<String, BTreeMap<String, PathBuf>>;

fn scan_blocking(dir: &Path) -> Groups {
    let mut groups = Groups::new();
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "Nothing to restore");
        return groups;
    }

    for entry in WalkDir::new(dir).min_depth(1).max_depth(3) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(OsStr::to_str) != Some("json") {
            continue;
        }
        let stem = path.file_stem().and_then(OsStr::to_str);
        let id = path.parent().and_then(Path::file_name).and_then(OsStr::to_str);
        if let (Some(stem), Some(id)) = (stem, id) {
            groups
                .entry(id.to_string())
                .or_default()
                .insert(stem.to_string(), path.to_path_buf());
        }
    }
    debug!(dir = %dir.display(), resources = groups.len(), "Scanned");
    groups
}

/// Groups every `*.json` file below `dir` by its parent directory.
pub(crate) async fn scan(dir: PathBuf) -> Result<Groups, RunnerError> {
    Ok(tokio::task::spawn_blocking(move || scan_blocking(&dir)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_groups_by_parent_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let products = tmp.path().join("products");
        for (id, file) in [("1", "product.json"), ("1", "product_media.json"), ("2", "product.json"), ("2", "notes.txt")] {
            std::fs::create_dir_all(products.join(id)).unwrap();
            std::fs::write(products.join(id).join(file), "{}").unwrap();
        }

        let groups = scan(products.clone()).await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups["1"].keys().collect::<Vec<_>>(),
            vec!["product", "product_media"]
        );
        assert_eq!(groups["2"]["product"], products.join("2/product.json"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(scan(tmp.path().join("customers")).await.unwrap().is_empty());
    }
}
