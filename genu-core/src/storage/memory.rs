use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use bytes::Bytes;

use super::{ObjectBody, ObjectHead, ObjectStore, StoreError};

#[derive(Clone)]
struct StoredObject {
    content_type: String,
    body: Bytes,
}

/// In-process object store
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<HashMap<String, StoredObject>>,
    chunk_size: usize,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
            chunk_size: 8 * 1024,
        }
    }

    pub async fn insert(&self, key: &str, content_type: &str, body: impl Into<Bytes>) {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                body: body.into(),
            },
        );
    }

    /// Stored bytes for `key`, if any
    pub async fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.body.clone())
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError> {
        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(ObjectHead {
            content_type: object.content_type.clone(),
            content_length: object.body.len() as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<ObjectBody, StoreError> {
        let body = self
            .object(key)
            .await
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let chunks: Vec<Result<Bytes, StoreError>> = body
            .chunks(self.chunk_size)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<(), StoreError> {
        let body = tokio::fs::read(path).await?;
        self.insert(key, "binary/octet-stream", body).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn head_reports_stored_length() {
        let store = MemoryObjectStore::new("bucket");
        store.insert("a.txt", "text/plain", vec![0u8; 20_000]).await;

        let head = store.head("a.txt").await.unwrap();
        assert_eq!(head.content_length, 20_000);
        assert_eq!(head.content_type, "text/plain");

        let chunks: Vec<Bytes> = store.get("a.txt").await.unwrap().try_collect().await.unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), 20_000);
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let store = MemoryObjectStore::new("bucket");
        assert!(matches!(store.head("nope").await, Err(StoreError::NotFound(_))));
        assert!(store.get("nope").await.is_err());
    }
}
