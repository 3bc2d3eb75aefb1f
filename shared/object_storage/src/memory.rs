//! In-process object store used as a test double for the client contract

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectStore, ObjectStream};
use crate::types::{
    location_constraint, Bucket, ObjectBody, ObjectSummary, PresignRequest, PresignedUrl,
};

const DEFAULT_ENDPOINT: &str = "http://localhost:4566";
const DEFAULT_SIGNING_KEY: &str = "memory-store-signing-key";
const SIGNING_ALGORITHM: &str = "HMAC-SHA256";

#[derive(Debug)]
struct StoredObject {
    data: Vec<u8>,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct StoredBucket {
    region: String,
    creation_date: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

impl StoredBucket {
    fn summaries(&self) -> Vec<StorageResult<ObjectSummary>> {
        self.objects
            .iter()
            .map(|(key, object)| {
                Ok(ObjectSummary {
                    key: key.clone(),
                    size: object.data.len() as u64,
                    last_modified: Some(object.last_modified),
                    etag: Some(object.etag.clone()),
                })
            })
            .collect()
    }
}

/// Object store that keeps buckets in process memory.
///
/// Enforces the same contract as S3: globally unique bucket names, buckets
/// must be empty before deletion, deletes of missing keys succeed. Presigned
/// URLs are signed locally with HMAC-SHA256 and use the SigV4 query
/// parameter names.
#[derive(Clone)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, StoredBucket>>>,
    endpoint: String,
    signing_key: Option<String>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// Creates an empty store that signs with a built-in key
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: Arc::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            signing_key: Some(DEFAULT_SIGNING_KEY.to_string()),
        }
    }

    /// Creates an empty store with no signing credentials, so presigning fails
    #[must_use]
    pub fn without_credentials() -> Self {
        Self {
            signing_key: None,
            ..Self::new()
        }
    }

    /// Overrides the endpoint presigned URLs point at
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn bucket_not_found(bucket: &str) -> StorageError {
        StorageError::BucketNotFound {
            bucket: bucket.to_string(),
        }
    }

    fn sign(signing_key: &str, canonical_request: &str) -> StorageResult<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(signing_key.as_bytes()).map_err(|e| {
            StorageError::SigningError {
                message: e.to_string(),
            }
        })?;
        mac.update(canonical_request.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn create_bucket(&self, name: &str, region: &str) -> StorageResult<Bucket> {
        location_constraint(region)?;

        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(name) {
            return Err(StorageError::NameConflict {
                bucket: name.to_string(),
            });
        }

        let creation_date = Utc::now();
        buckets.insert(
            name.to_string(),
            StoredBucket {
                region: region.to_string(),
                creation_date,
                objects: BTreeMap::new(),
            },
        );
        info!("Created bucket {name} in {region}");

        Ok(Bucket {
            name: name.to_string(),
            region: Some(region.to_string()),
            creation_date: Some(creation_date),
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, body: ObjectBody) -> StorageResult<()> {
        let data = match body {
            ObjectBody::Bytes(bytes) => bytes,
            ObjectBody::File(path) => {
                tokio::fs::read(&path)
                    .await
                    .map_err(|e| StorageError::TransferError {
                        message: format!("Failed to read {}: {e}", path.display()),
                    })?
            }
        };

        let mut buckets = self.buckets.write().await;
        let stored = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::bucket_not_found(bucket))?;

        debug!("Storing {} bytes at {bucket}/{key}", data.len());
        let etag = format!("\"{}\"", hex::encode(Sha256::digest(&data)));
        stored.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                etag,
                last_modified: Utc::now(),
            },
        );

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let buckets = self.buckets.read().await;
        let stored = buckets
            .get(bucket)
            .ok_or_else(|| Self::bucket_not_found(bucket))?;

        stored
            .objects
            .get(key)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn presign(&self, request: &PresignRequest) -> StorageResult<PresignedUrl> {
        let signing_key = self
            .signing_key
            .as_deref()
            .ok_or_else(|| StorageError::SigningError {
                message: "no credentials available".to_string(),
            })?;

        let signed_at = DateTime::<Utc>::from(request.signing_time());
        let amz_date = signed_at.format("%Y%m%dT%H%M%SZ").to_string();
        let expires = request.expires_in.as_secs().to_string();

        let mut url = Url::parse(&self.endpoint).map_err(|e| StorageError::SigningError {
            message: format!("Invalid endpoint {}: {e}", self.endpoint),
        })?;
        url.path_segments_mut()
            .map_err(|()| StorageError::SigningError {
                message: format!("Endpoint {} cannot carry a path", self.endpoint),
            })?
            .pop_if_empty()
            .push(&request.bucket)
            .extend(request.key.split('/'));

        let canonical_request = format!(
            "{}\n{}\n{amz_date}\n{expires}",
            request.operation,
            url.path()
        );
        let signature = Self::sign(signing_key, &canonical_request)?;

        url.query_pairs_mut()
            .append_pair("X-Amz-Algorithm", SIGNING_ALGORITHM)
            .append_pair("X-Amz-Date", &amz_date)
            .append_pair("X-Amz-Expires", &expires)
            .append_pair("X-Amz-Signature", &signature);

        Ok(PresignedUrl {
            url: url.to_string(),
            operation: request.operation,
            expires_at: signed_at + request.expires_in.duration(),
        })
    }

    async fn list_buckets(&self) -> StorageResult<Vec<Bucket>> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .iter()
            .map(|(name, stored)| Bucket {
                name: name.clone(),
                region: Some(stored.region.clone()),
                creation_date: Some(stored.creation_date),
            })
            .collect())
    }

    fn list_objects(&self, bucket: &str) -> ObjectStream {
        let buckets = Arc::clone(&self.buckets);
        let bucket = bucket.to_string();

        stream::once(async move {
            buckets.read().await.get(&bucket).map_or_else(
                || vec![Err(Self::bucket_not_found(&bucket))],
                StoredBucket::summaries,
            )
        })
        .flat_map(stream::iter)
        .boxed()
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut buckets = self.buckets.write().await;
        let stored = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::bucket_not_found(bucket))?;

        if stored.objects.remove(key).is_none() {
            debug!("Object {bucket}/{key} already absent");
        }
        Ok(())
    }

    async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        let mut buckets = self.buckets.write().await;
        let stored = buckets
            .get(name)
            .ok_or_else(|| Self::bucket_not_found(name))?;

        if !stored.objects.is_empty() {
            return Err(StorageError::BucketNotEmpty {
                bucket: name.to_string(),
            });
        }

        buckets.remove(name);
        info!("Deleted bucket {name}");
        Ok(())
    }
}
