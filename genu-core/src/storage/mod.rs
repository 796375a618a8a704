mod memory;
mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use bytes::Bytes;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object store error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Metadata returned by a head lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub content_type: String,
    pub content_length: u64,
}

pub type ObjectBody = Pin<Box<dyn Stream<Item = Result<Bytes, StoreError>> + Send>>;

/// Bucket-scoped object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError>;

    /// Stream the object's bytes
    async fn get(&self, key: &str) -> Result<ObjectBody, StoreError>;

    /// Upload a local file under `key`
    async fn put_file(&self, key: &str, path: &Path) -> Result<(), StoreError>;
}
