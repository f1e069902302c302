//! Object-store collaborator for uploaded CV documents.
//!
//! `FileRef` is the single opaque handle persisted on CV records; its
//! `bucket|key` encoding is private to this module.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;

/// Opaque handle to a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef(String);

impl FileRef {
    const SEPARATOR: char = '|';

    pub fn new(bucket: &str, key: &str) -> Self {
        Self(format!("{bucket}{}{key}", Self::SEPARATOR))
    }

    pub fn parse(encoded: &str) -> Result<Self, AppError> {
        if !encoded.contains(Self::SEPARATOR) {
            return Err(AppError::Validation(format!(
                "malformed file reference '{encoded}'"
            )));
        }
        Ok(Self(encoded.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn bucket_and_key(&self) -> (&str, &str) {
        // Constructors guarantee the separator is present.
        self.0.split_once(Self::SEPARATOR).unwrap_or(("", &self.0))
    }
}

/// Storage capability surface the CV pipeline depends on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores a CV document under `documents/{user_id}/{uuid}-{name}`.
    async fn put_document(
        &self,
        user_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileRef, AppError>;

    async fn get(&self, file_ref: &FileRef) -> Result<Vec<u8>, AppError>;

    /// Short-lived signed GET URL for one-shot downloads.
    async fn presign_get(&self, file_ref: &FileRef, ttl: Duration) -> Result<String, AppError>;
}

pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Constructs a client for an S3-compatible endpoint (MinIO locally,
    /// any S3 region in production).
    pub async fn from_config(config: &Config) -> Option<Self> {
        let (access_key, secret_key, endpoint) = match (
            &config.storage_access_key,
            &config.storage_secret_key,
            &config.file_storage_url,
        ) {
            (Some(a), Some(s), Some(e)) => (a.clone(), s.clone(), e.clone()),
            _ => return None,
        };

        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "jobhive-static",
        );
        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .load()
            .await;

        Some(Self::new(
            S3Client::new(&s3_config),
            config.documents_bucket.clone(),
        ))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_document(
        &self,
        user_id: Uuid,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<FileRef, AppError> {
        let key = format!("documents/{user_id}/{}-{file_name}", Uuid::new_v4());
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(bytes.into())
            .send()
            .await
            .map_err(|e| AppError::StorageIo(format!("upload failed: {e}")))?;
        Ok(FileRef::new(&self.bucket, &key))
    }

    async fn get(&self, file_ref: &FileRef) -> Result<Vec<u8>, AppError> {
        let (bucket, key) = file_ref.bucket_and_key();
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::StorageIo(format!("download failed: {e}")))?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::StorageIo(format!("read failed: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn presign_get(&self, file_ref: &FileRef, ttl: Duration) -> Result<String, AppError> {
        let (bucket, key) = file_ref.bucket_and_key();
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| AppError::StorageIo(format!("presign config: {e}")))?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::StorageIo(format!("presign failed: {e}")))?;
        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ref_round_trip() {
        let r = FileRef::new("documents", "documents/u1/abc-resume.pdf");
        assert_eq!(r.bucket_and_key(), ("documents", "documents/u1/abc-resume.pdf"));

        let parsed = FileRef::parse(r.as_str()).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn test_file_ref_rejects_bare_values() {
        assert!(FileRef::parse("just-a-db-id").is_err());
    }
}
