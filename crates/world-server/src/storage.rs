pub mod file;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::CoreResult;

pub use file::FileStorage;

/// JSON document store keyed by path segments, e.g.
/// `["area", "load", area_id]` for `area/load/<area_id>.json`.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn write(&self, keys: &[&str], data: &Value) -> CoreResult<()>;
    async fn read(&self, keys: &[&str]) -> CoreResult<Option<Value>>;
    /// Returns false when there was nothing to delete.
    async fn delete(&self, keys: &[&str]) -> CoreResult<bool>;
    async fn exists(&self, keys: &[&str]) -> CoreResult<bool>;
    /// Ids of the documents directly inside a collection, sorted. A missing
    /// collection lists as empty.
    async fn list_documents(&self, keys: &[&str]) -> CoreResult<Vec<String>>;
    /// Names of the sub-collections directly inside a collection, sorted.
    async fn list_collections(&self, keys: &[&str]) -> CoreResult<Vec<String>>;
}

pub type SharedStorage = Arc<dyn Storage>;
