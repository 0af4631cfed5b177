//! [`BlobStore`] on S3.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use common::StoreError;

use super::backend;
use crate::store::BlobStore;

pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(backend(format!("PutObject s3://{bucket}/{key}")))?;
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let out = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) {
                    StoreError::NotFound(format!("s3://{bucket}/{key}"))
                } else {
                    backend(format!("GetObject s3://{bucket}/{key}"))(e)
                }
            })?;

        let body = out
            .body
            .collect()
            .await
            .map_err(backend(format!("reading s3://{bucket}/{key}")))?
            .into_bytes();
        Ok(body.to_vec())
    }
}
