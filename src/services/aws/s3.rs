use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::{
    Client,
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
};
use base64::Engine;
use bytes::Bytes;
use std::{collections::HashMap, path::Path};
use tokio::{fs::File, io::AsyncReadExt};
use tracing::{debug, warn};

use crate::errors::{RecorderError, RecorderResult};
use crate::services::provider::ObjectStore;

/// Size of every multipart part except the last.
pub const PART_SIZE: usize = 10 * 1024 * 1024;

/// Base64 MD5 digest, as expected by the `Content-MD5` header.
pub fn content_md5(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(md5::compute(data).0)
}

/// Read the next part of `file` into `buf`; an empty buffer means end of file.
async fn read_part(file: &mut File, buf: &mut Vec<u8>) -> std::io::Result<()> {
    buf.clear();
    (&mut *file).take(PART_SIZE as u64).read_to_end(buf).await?;
    Ok(())
}

/// S3 client used to archive logs.
#[derive(Clone)]
pub struct AwsObjectStore {
    client: Client,
}

impl AwsObjectStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    async fn put_file(&self, bucket: &str, file: &Path, key: &str) -> RecorderResult<()> {
        let body = ByteStream::from_path(file)
            .await
            .map_err(|e| RecorderError::provider("PutObject", e))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| RecorderError::provider("PutObject", DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        file: &Path,
        key: &str,
        upload_id: &str,
    ) -> RecorderResult<()> {
        let mut reader = File::open(file).await?;
        let mut buf = Vec::with_capacity(PART_SIZE);
        let mut parts = Vec::new();

        loop {
            read_part(&mut reader, &mut buf).await?;
            if buf.is_empty() {
                break;
            }
            let part_number = i32::try_from(parts.len() + 1).map_err(|_| {
                RecorderError::IncompleteResponse {
                    operation: "UploadPart",
                    detail: "too many parts".into(),
                }
            })?;

            let output = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .content_md5(content_md5(&buf))
                .body(ByteStream::from(Bytes::copy_from_slice(&buf)))
                .send()
                .await
                .map_err(|e| RecorderError::provider("UploadPart", DisplayErrorContext(&e)))?;
            debug!(key, part_number, size = buf.len(), "part uploaded");

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            if buf.len() < PART_SIZE {
                break;
            }
        }

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                RecorderError::provider("CompleteMultipartUpload", DisplayErrorContext(&e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for AwsObjectStore {
    async fn list_buckets(&self) -> RecorderResult<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| RecorderError::provider("ListBuckets", DisplayErrorContext(&e)))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_string))
            .collect())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> RecorderResult<Vec<String>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| RecorderError::provider("ListObjectsV2", DisplayErrorContext(&e)))?;

        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        metadata: HashMap<String, String>,
    ) -> RecorderResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_metadata(Some(metadata))
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| RecorderError::provider("PutObject", DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn upload_large_file(&self, bucket: &str, file: &Path, key: &str) -> RecorderResult<()> {
        let size = tokio::fs::metadata(file).await?.len();
        if size <= PART_SIZE as u64 {
            return self.put_file(bucket, file, key).await;
        }

        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                RecorderError::provider("CreateMultipartUpload", DisplayErrorContext(&e))
            })?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| RecorderError::IncompleteResponse {
                operation: "CreateMultipartUpload",
                detail: "missing upload id".into(),
            })?
            .to_string();

        let result = self.upload_parts(bucket, file, key, &upload_id).await;
        if result.is_err() {
            if let Err(err) = self
                .client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!(key, upload_id = %upload_id, error = %DisplayErrorContext(&err), "unable to abort the multipart upload");
            }
        }
        result
    }
}
