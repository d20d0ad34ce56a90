//! Backup doer: runs a resource's handler and stores the document it returns
//! as JSON under the backup root.

use super::core::Doer;
use super::error::EngineError;
use super::resource::Resource;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DEFAULT_PREFIX: &str = "backup";

/// Writes one JSON document per resource to
/// `<dir>/<prefix>_<timestamp>_<id>/<resource path>/<file>.json`.
#[derive(Debug, Clone)]
pub struct Backup {
    id: String,
    store: String,
    dir: PathBuf,
    prefix: String,
    timestamp: DateTime<Local>,
}

impl Backup {
    pub fn new(store: impl Into<String>) -> Self {
        let store = store.into();
        let timestamp = Local::now();
        Self {
            id: backup_id(&store, timestamp.timestamp()),
            store,
            dir: std::env::temp_dir(),
            prefix: DEFAULT_PREFIX.to_string(),
            timestamp,
        }
    }

    /// Directory the backup folder is created in.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Prefix of the backup folder name.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !prefix.is_empty() {
            self.prefix = prefix;
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    /// Name of the backup folder. Carries the ID so two stores backed up in
    /// the same second never share a folder.
    pub fn name(&self) -> String {
        format!("{}_{}_{}", self.prefix, self.timestamp.format("%Y_%m_%d_%H_%M_%S"), self.id)
    }

    /// Full path of the backup folder.
    pub fn root(&self) -> PathBuf {
        self.dir.join(self.name())
    }
}

#[async_trait]
impl Doer for Backup {
    type Payload = Value;

    async fn execute(
        &self,
        ctx: &CancellationToken,
        resource: &Resource<Value>,
        input: Option<&Value>,
    ) -> Result<Value, EngineError> {
        let dir = self.root().join(&resource.path);
        tokio::fs::create_dir_all(&dir).await?;

        let data = resource.handler.handle(ctx, input).await?;

        let dest = dir.join(format!("{}.json", resource.kind.file()));
        let json = serde_json::to_vec(&data)?;
        tokio::fs::write(&dest, json).await?;

        debug!(resource_type = %resource.kind, file = %dest.display(), "Saved");
        Ok(data)
    }
}

fn backup_id(store: &str, unix_seconds: i64) -> String {
    let hash = Sha256::digest(format!("{store}-{unix_seconds}").as_bytes());
    format!("bkp-{}", hex::encode(&hash[..5]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockHandler;
    use crate::engine::ResourceType;
    use serde_json::json;

    #[test]
    fn test_backup_id_is_stable_per_store_and_time() {
        let id = backup_id("teststore.example.com", 1_700_000_000);
        assert_eq!(id, backup_id("teststore.example.com", 1_700_000_000));
        assert_ne!(id, backup_id("other.example.com", 1_700_000_000));
        assert!(id.starts_with("bkp-"));
        assert_eq!(id.len(), 4 + 10);
    }

    #[test]
    fn test_root_uses_prefix_timestamp_and_id() {
        let bkp = Backup::new("teststore.example.com").with_dir("/backups").with_prefix("nightly");
        let expected = format!("nightly_{}_{}", bkp.timestamp().format("%Y_%m_%d_%H_%M_%S"), bkp.id());
        assert_eq!(bkp.name(), expected);
        assert!(bkp.name().ends_with(&format!("_{}", bkp.id())));
        assert_eq!(bkp.root(), PathBuf::from("/backups").join(expected));

        let defaulted = Backup::new("teststore.example.com").with_prefix("");
        assert!(defaulted.name().starts_with("backup_"));
    }

    #[tokio::test]
    async fn test_execute_writes_document() {
        let tmp = tempfile::tempdir().unwrap();
        let bkp = Backup::new("teststore.example.com").with_dir(tmp.path());
        let document = json!({"id": "gid://shopify/Product/8737843216608", "title": "Test Product"});
        let resource = Resource::new(
            ResourceType::Product,
            "products/8737843216608",
            MockHandler::succeed(document.clone()),
        );

        let out = bkp.execute(&CancellationToken::new(), &resource, None).await.unwrap();
        assert_eq!(out, document);

        let written = std::fs::read(bkp.root().join("products/8737843216608/product.json")).unwrap();
        assert_eq!(
            String::from_utf8(written).unwrap(),
            r#"{"id":"gid://shopify/Product/8737843216608","title":"Test Product"}"#
        );
    }

    #[tokio::test]
    async fn test_failed_handler_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let bkp = Backup::new("teststore.example.com").with_dir(tmp.path());
        let resource = Resource::new(ResourceType::ProductMedia, "products/1", MockHandler::<Value>::fail("no media"));

        assert!(bkp.execute(&CancellationToken::new(), &resource, None).await.is_err());
        assert!(!bkp.root().join("products/1/product_media.json").exists());
    }
}
