//! Object storage client facade

use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use futures::TryStreamExt;
use tracing::{debug, error, info};

use crate::confirm::Confirmation;
use crate::environment::Environment;
use crate::error::StorageResult;
use crate::memory::MemoryObjectStore;
use crate::s3::S3ObjectStore;
use crate::store::{ObjectStore, ObjectStream};
use crate::types::{
    validate_bucket_name, Bucket, ObjectBody, ObjectSummary, PresignExpiry, PresignOperation,
    PresignRequest, PresignedUrl,
};

/// Result of [`ObjectStorageClient::empty_and_delete_bucket`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The confirmation callback declined; nothing was deleted
    Declined,
    /// All objects and the bucket were deleted
    Deleted {
        /// Number of objects removed before the bucket
        objects_deleted: usize,
    },
}

/// Bucket and object operations over any [`ObjectStore`] backend
#[derive(Clone)]
pub struct ObjectStorageClient {
    store: Arc<dyn ObjectStore>,
    presign_expiry: PresignExpiry,
}

impl ObjectStorageClient {
    /// Creates a client over a backend, with one-hour presigned URLs
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            presign_expiry: PresignExpiry::default(),
        }
    }

    /// Creates a client backed by S3
    #[must_use]
    pub fn s3(s3_client: Arc<S3Client>) -> Self {
        Self::new(Arc::new(S3ObjectStore::new(s3_client)))
    }

    /// Creates a client backed by S3, configured from the environment
    pub async fn from_environment(environment: &Environment) -> Self {
        let store = S3ObjectStore::from_environment(environment).await;
        Self::new(Arc::new(store)).with_presign_expiry(environment.presign_expiry())
    }

    /// Creates a client backed by an empty in-memory store
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryObjectStore::new()))
    }

    /// Sets the expiry used by [`Self::share_object`]
    #[must_use]
    pub fn with_presign_expiry(mut self, presign_expiry: PresignExpiry) -> Self {
        self.presign_expiry = presign_expiry;
        self
    }

    /// Creates a bucket in the given region
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidBucketName` if the name breaks the naming rules
    /// Returns `StorageError::InvalidRegion` if the region is not a known location constraint
    /// Returns `StorageError::NameConflict` if the name is already taken
    pub async fn create_bucket(&self, name: &str, region: &str) -> StorageResult<Bucket> {
        validate_bucket_name(name)?;
        self.store.create_bucket(name, region).await
    }

    /// Creates or overwrites an object
    ///
    /// Content types are not checked: when copying between objects the caller
    /// keeps source and destination encodings consistent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BucketNotFound` if the bucket does not exist
    /// Returns `StorageError::PermissionDenied` if the caller may not write
    /// Returns `StorageError::TransferError` if the body cannot be read or sent
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: impl Into<ObjectBody> + Send,
    ) -> StorageResult<()> {
        self.store.put_object(bucket, key, body.into()).await
    }

    /// Downloads an object
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the key does not exist
    /// Returns `StorageError::BucketNotFound` if the bucket does not exist
    pub async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.store.get_object(bucket, key).await
    }

    /// Signs a URL granting temporary access to one object
    ///
    /// The expiry is validated before anything is signed. No request is sent.
    ///
    /// # Arguments
    ///
    /// * `bucket` - Bucket name
    /// * `key` - Object key
    /// * `operation` - Operation the URL grants
    /// * `expiry_secs` - URL lifetime, between 1 second and 1 week
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidExpiry` if `expiry_secs` is out of range
    /// Returns `StorageError::SigningError` if no credentials are available
    pub async fn generate_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        operation: PresignOperation,
        expiry_secs: u64,
    ) -> StorageResult<PresignedUrl> {
        let expires_in = PresignExpiry::from_secs(expiry_secs)?;
        self.presign(&PresignRequest::new(bucket, key, operation, expires_in))
            .await
    }

    /// Signs a prepared request
    ///
    /// # Errors
    ///
    /// Returns `StorageError::SigningError` if no credentials are available
    pub async fn presign(&self, request: &PresignRequest) -> StorageResult<PresignedUrl> {
        self.store.presign(request).await
    }

    /// Best-effort GET URL for sharing an object
    ///
    /// Failures are logged and reported as `None`.
    pub async fn share_object(&self, bucket: &str, key: &str) -> Option<PresignedUrl> {
        let request = PresignRequest::new(bucket, key, PresignOperation::Get, self.presign_expiry);
        match self.store.presign(&request).await {
            Ok(url) => Some(url),
            Err(e) => {
                error!("Failed to share s3://{bucket}/{key}: {e}");
                None
            }
        }
    }

    /// Lists the buckets owned by the caller, in no particular order
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing request fails
    pub async fn list_buckets(&self) -> StorageResult<Vec<Bucket>> {
        self.store.list_buckets().await
    }

    /// Lazily lists the objects of a bucket
    ///
    /// Every call starts a new listing; nothing is cached between calls.
    #[must_use]
    pub fn list_objects(&self, bucket: &str) -> ObjectStream {
        self.store.list_objects(bucket)
    }

    /// Collects a full bucket listing
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BucketNotFound` if the bucket does not exist
    pub async fn collect_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectSummary>> {
        self.list_objects(bucket).try_collect().await
    }

    /// Deletes an object; deleting a missing key succeeds
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BucketNotFound` if the bucket does not exist
    pub async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.store.delete_object(bucket, key).await
    }

    /// Deletes an empty bucket
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BucketNotEmpty` if any object remains
    /// Returns `StorageError::BucketNotFound` if the bucket does not exist
    pub async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        self.store.delete_bucket(name).await
    }

    /// Deletes every object in a bucket and then the bucket itself
    ///
    /// Asks `confirmation` first and deletes nothing when it declines.
    ///
    /// # Errors
    ///
    /// Returns the first `StorageError` hit while listing or deleting
    pub async fn empty_and_delete_bucket(
        &self,
        bucket: &str,
        confirmation: &dyn Confirmation,
    ) -> StorageResult<Teardown> {
        let prompt = format!("\nPress Enter to delete all objects and the bucket {bucket}:");
        if !confirmation.confirm(&prompt).await {
            info!("Keeping bucket {bucket}");
            return Ok(Teardown::Declined);
        }

        let mut objects = self.list_objects(bucket);
        let mut objects_deleted = 0;
        while let Some(object) = objects.try_next().await? {
            self.delete_object(bucket, &object.key).await?;
            objects_deleted += 1;
        }
        debug!("Deleted {objects_deleted} objects from {bucket}");

        self.delete_bucket(bucket).await?;
        Ok(Teardown::Deleted { objects_deleted })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::StorageError;
    use crate::types::MAX_PRESIGN_EXPIRY_SECS;

    const REGION: &str = "ap-northeast-1";

    #[tokio::test]
    async fn test_round_trip_bytes() {
        let client = ObjectStorageClient::in_memory();
        client.create_bucket("test-abc123", REGION).await.unwrap();

        let bodies: [&[u8]; 3] = [b"", b"Hello World!", &[0, 159, 146, 150, 255]];
        for (i, body) in bodies.into_iter().enumerate() {
            let key = format!("dir/{i}.bin");
            client.put_object("test-abc123", &key, body).await.unwrap();
            assert_eq!(client.get_object("test-abc123", &key).await.unwrap(), body);
        }
    }

    #[tokio::test]
    async fn test_delete_object_is_idempotent() {
        let client = ObjectStorageClient::in_memory();
        client.create_bucket("test-abc123", REGION).await.unwrap();
        client
            .put_object("test-abc123", "Hello.txt", "Hello World!")
            .await
            .unwrap();

        client.delete_object("test-abc123", "Hello.txt").await.unwrap();
        client.delete_object("test-abc123", "Hello.txt").await.unwrap();

        let err = client
            .get_object("test-abc123", "Hello.txt")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_bucket_requires_empty_bucket() {
        let client = ObjectStorageClient::in_memory();
        client.create_bucket("test-abc123", REGION).await.unwrap();
        client
            .put_object("test-abc123", "Hello.txt", "Hello World!")
            .await
            .unwrap();

        assert_eq!(
            client.delete_bucket("test-abc123").await,
            Err(StorageError::BucketNotEmpty {
                bucket: "test-abc123".to_string()
            })
        );

        client.delete_object("test-abc123", "Hello.txt").await.unwrap();
        client.delete_bucket("test-abc123").await.unwrap();
        assert!(client.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_is_validated_before_signing() {
        // A store without credentials would fail signing, so an InvalidExpiry
        // here proves the range check ran first
        let client = ObjectStorageClient::new(Arc::new(MemoryObjectStore::without_credentials()));

        for seconds in [0, MAX_PRESIGN_EXPIRY_SECS + 1] {
            let err = client
                .generate_presigned_url("test-abc123", "key", PresignOperation::Get, seconds)
                .await
                .unwrap_err();
            assert_eq!(err, StorageError::InvalidExpiry { seconds });
        }

        let err = client
            .generate_presigned_url("test-abc123", "key", PresignOperation::Get, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SigningError { .. }));
    }

    #[tokio::test]
    async fn test_share_object_is_best_effort() {
        let client = ObjectStorageClient::new(Arc::new(MemoryObjectStore::without_credentials()));
        assert_eq!(client.share_object("test-abc123", "Hello.txt").await, None);

        let client = ObjectStorageClient::in_memory()
            .with_presign_expiry(PresignExpiry::from_secs(90).unwrap());
        let shared = client.share_object("test-abc123", "Hello.txt").await.unwrap();
        assert!(shared.url.contains("X-Amz-Expires=90"));
        assert_eq!(shared.operation, PresignOperation::Get);
    }

    #[tokio::test]
    async fn test_invalid_bucket_name_is_rejected() {
        let client = ObjectStorageClient::in_memory();

        let err = client.create_bucket("Not_Valid", REGION).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidBucketName { .. }));
        assert!(client.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_declined_keeps_everything() {
        let client = ObjectStorageClient::in_memory();
        client.create_bucket("test-abc123", REGION).await.unwrap();
        client
            .put_object("test-abc123", "Hello.txt", "Hello World!")
            .await
            .unwrap();

        let outcome = client
            .empty_and_delete_bucket("test-abc123", &|_: &str| false)
            .await
            .unwrap();

        assert_eq!(outcome, Teardown::Declined);
        assert_eq!(client.collect_objects("test-abc123").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_teardown_drains_then_deletes() {
        let client = ObjectStorageClient::in_memory();
        client.create_bucket("test-abc123", REGION).await.unwrap();
        for key in ["a.txt", "b/c.txt", "Result/Converted.pdf"] {
            client.put_object("test-abc123", key, key).await.unwrap();
        }

        let outcome = client
            .empty_and_delete_bucket("test-abc123", &|prompt: &str| {
                prompt.contains("test-abc123")
            })
            .await
            .unwrap();

        assert_eq!(outcome, Teardown::Deleted { objects_deleted: 3 });
        assert!(client.list_buckets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_of_missing_bucket_fails() {
        let client = ObjectStorageClient::in_memory();

        let err = client
            .empty_and_delete_bucket("missing", &|_: &str| true)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StorageError::BucketNotFound {
                bucket: "missing".to_string()
            }
        );
    }
}
