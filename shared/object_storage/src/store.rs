//! Backend seam shared by the S3 and in-memory stores

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StorageResult;
use crate::types::{Bucket, ObjectBody, ObjectSummary, PresignRequest, PresignedUrl};

/// Lazy, finite listing of the objects in one bucket
pub type ObjectStream = BoxStream<'static, StorageResult<ObjectSummary>>;

/// Bucket and object operations, implemented by each backend.
///
/// Every call maps to a single request against the service; implementations
/// hold no state across calls beyond their session handle.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket in the given region.
    async fn create_bucket(&self, name: &str, region: &str) -> StorageResult<Bucket>;

    /// Create or overwrite an object.
    async fn put_object(&self, bucket: &str, key: &str, body: ObjectBody) -> StorageResult<()>;

    /// Download an object into memory.
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Sign a URL locally. No request is sent.
    async fn presign(&self, request: &PresignRequest) -> StorageResult<PresignedUrl>;

    /// List the buckets owned by the caller.
    async fn list_buckets(&self) -> StorageResult<Vec<Bucket>>;

    /// List the objects of a bucket, fetching pages as the stream is polled.
    /// Each call starts a fresh listing.
    fn list_objects(&self, bucket: &str) -> ObjectStream;

    /// Delete an object. Missing keys are not an error.
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Delete an empty bucket.
    async fn delete_bucket(&self, name: &str) -> StorageResult<()>;
}
