use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use super::{ObjectBody, ObjectHead, ObjectStore, StoreError};

const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

pub struct S3ObjectStore {
    bucket: String,
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            client,
        }
    }

    /// Client from the default credential chain, optionally pinned to a region
    pub async fn from_env(bucket: impl Into<String>, region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region));
        }
        let config = loader.load().await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Backend(DisplayErrorContext(&e).to_string())
                }
            })?;

        Ok(ObjectHead {
            content_type: output
                .content_type()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            content_length: output.content_length().unwrap_or_default().max(0) as u64,
        })
    }

    async fn get(&self, key: &str) -> Result<ObjectBody, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Backend(DisplayErrorContext(&e).to_string())
                }
            })?;

        let chunks = futures::stream::unfold(output.body, |mut body| async move {
            body.next().await.map(|chunk| {
                (
                    chunk.map_err(|e| StoreError::Backend(e.to_string())),
                    body,
                )
            })
        });
        Ok(Box::pin(chunks))
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<(), StoreError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {}", path.display(), e)))?;
        debug!("put s3://{}/{} from {}", self.bucket, key, path.display());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Backend(DisplayErrorContext(&e).to_string()))
    }
}
