//! S3-backed object store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    error::{DisplayErrorContext, SdkError},
    presigning::{PresignedRequest, PresigningConfig},
    primitives::ByteStream,
    types::{CreateBucketConfiguration, Object},
    Client as S3Client,
};
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::environment::Environment;
use crate::error::{StorageError, StorageResult, Target};
use crate::store::{ObjectStore, ObjectStream};
use crate::types::{
    location_constraint, to_utc, Bucket, ObjectBody, ObjectSummary, PresignOperation,
    PresignRequest, PresignedUrl,
};

/// Response header S3 uses to report where a bucket lives, on redirects too
const BUCKET_REGION_HEADER: &str = "x-amz-bucket-region";

/// Object store backed by the AWS S3 SDK
///
/// Requests for a bucket are sent to the region it lives in. Regions are
/// remembered for buckets this store created or listed, and looked up with
/// `HeadBucket` for any other bucket before the first object call.
#[derive(Clone)]
pub struct S3ObjectStore {
    s3_client: Arc<S3Client>,
    bucket_regions: Arc<RwLock<HashMap<String, String>>>,
}

impl S3ObjectStore {
    /// Creates a new S3 object store
    ///
    /// # Arguments
    ///
    /// * `s3_client` - Pre-configured S3 client
    #[must_use]
    pub fn new(s3_client: Arc<S3Client>) -> Self {
        Self {
            s3_client,
            bucket_regions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a store whose client is configured for the given environment
    pub async fn from_environment(environment: &Environment) -> Self {
        let s3_client = S3Client::from_conf(environment.s3_client_config().await);
        Self::new(Arc::new(s3_client))
    }

    async fn remember_region(&self, bucket: &str, region: &str) {
        self.bucket_regions
            .write()
            .await
            .insert(bucket.to_string(), region.to_string());
    }

    async fn known_region(&self, bucket: &str) -> Option<String> {
        self.bucket_regions.read().await.get(bucket).cloned()
    }

    /// Region the bucket lives in, when S3 will tell
    ///
    /// Falls back to the client region when the lookup fails, so the
    /// object call itself reports the failure.
    async fn bucket_region(&self, bucket: &str) -> Option<String> {
        let cached = self.known_region(bucket).await;
        if cached.is_some() {
            return cached;
        }

        let region = match self.s3_client.head_bucket().bucket(bucket).send().await {
            Ok(output) => output.bucket_region().map(ToString::to_string),
            Err(e) => e
                .raw_response()
                .and_then(|response| response.headers().get(BUCKET_REGION_HEADER))
                .map(ToString::to_string),
        }?;

        debug!("Resolved region {region} for bucket {bucket}");
        self.remember_region(bucket, &region).await;
        Some(region)
    }

    async fn presigned_request(
        &self,
        request: &PresignRequest,
        config: PresigningConfig,
    ) -> StorageResult<PresignedRequest> {
        // Presigning stays offline, so only remembered regions apply
        let region = self.known_region(&request.bucket).await;

        match request.operation {
            PresignOperation::Get => self
                .s3_client
                .get_object()
                .bucket(&request.bucket)
                .key(&request.key)
                .customize()
                .config_override(region_override(region.as_deref()))
                .presigned(config)
                .await
                .map_err(|e| signing_error(&e)),
            PresignOperation::Put => self
                .s3_client
                .put_object()
                .bucket(&request.bucket)
                .key(&request.key)
                .customize()
                .config_override(region_override(region.as_deref()))
                .presigned(config)
                .await
                .map_err(|e| signing_error(&e)),
        }
    }
}

/// Per-request config pinning the region; empty when the region is unknown
fn region_override(region: Option<&str>) -> S3ConfigBuilder {
    let mut builder = S3ConfigBuilder::default();
    if let Some(region) = region {
        builder.set_region(Some(Region::new(region.to_string())));
    }
    builder
}

fn signing_error<E>(error: &SdkError<E>) -> StorageError
where
    E: std::error::Error + 'static,
{
    StorageError::SigningError {
        message: format!("Failed to generate presigned URL: {}", DisplayErrorContext(error)),
    }
}

fn to_summary(object: &Object) -> ObjectSummary {
    ObjectSummary {
        key: object.key().unwrap_or_default().to_string(),
        size: object
            .size()
            .and_then(|size| u64::try_from(size).ok())
            .unwrap_or_default(),
        last_modified: object.last_modified().and_then(to_utc),
        etag: object.e_tag().map(ToString::to_string),
    }
}

/// Position in a `ListObjectsV2` walk
enum Listing {
    Start,
    Next(String),
    Done,
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn create_bucket(&self, name: &str, region: &str) -> StorageResult<Bucket> {
        let constraint = location_constraint(region)?;
        debug!("Creating bucket {name} in {region}");

        let configuration = constraint.map(|constraint| {
            CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build()
        });

        // The constraint is only accepted by the endpoint of the same region
        self.s3_client
            .create_bucket()
            .bucket(name)
            .set_create_bucket_configuration(configuration)
            .customize()
            .config_override(region_override(Some(region)))
            .send()
            .await
            .map_err(|e| StorageError::from_sdk(e, Target::in_region(name, region)))?;

        self.remember_region(name, region).await;
        info!("Created bucket {name} in {region}");

        // CreateBucket does not echo the creation date; list_buckets reports it
        Ok(Bucket {
            name: name.to_string(),
            region: Some(region.to_string()),
            creation_date: None,
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, body: ObjectBody) -> StorageResult<()> {
        let body = match body {
            ObjectBody::Bytes(bytes) => ByteStream::from(bytes),
            ObjectBody::File(path) => {
                ByteStream::from_path(&path)
                    .await
                    .map_err(|e| StorageError::TransferError {
                        message: format!("Failed to read {}: {e}", path.display()),
                    })?
            }
        };
        let region = self.bucket_region(bucket).await;
        debug!("Uploading s3://{bucket}/{key}");

        self.s3_client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .customize()
            .config_override(region_override(region.as_deref()))
            .send()
            .await
            .map_err(|e| StorageError::from_sdk(e, Target::object(bucket, key)))?;

        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let region = self.bucket_region(bucket).await;
        debug!("Downloading s3://{bucket}/{key}");

        let response = self
            .s3_client
            .get_object()
            .bucket(bucket)
            .key(key)
            .customize()
            .config_override(region_override(region.as_deref()))
            .send()
            .await
            .map_err(|e| StorageError::from_sdk(e, Target::object(bucket, key)))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::TransferError {
                message: format!("Failed to read body of s3://{bucket}/{key}: {e}"),
            })?;

        Ok(body.into_bytes().to_vec())
    }

    async fn presign(&self, request: &PresignRequest) -> StorageResult<PresignedUrl> {
        let signed_at = request.signing_time();
        let presigned_config = PresigningConfig::builder()
            .start_time(signed_at)
            .expires_in(request.expires_in.duration())
            .build()
            .map_err(|e| StorageError::SigningError {
                message: format!("Failed to create presigning config: {e}"),
            })?;

        let presigned_request = self.presigned_request(request, presigned_config).await?;

        // Without a credentials provider the SDK hands back an unsigned URL
        let url = presigned_request.uri().to_string();
        if !url.contains("X-Amz-Signature=") {
            return Err(StorageError::SigningError {
                message: format!(
                    "No credentials available to sign s3://{}/{}",
                    request.bucket, request.key
                ),
            });
        }

        let expires_at: DateTime<Utc> =
            DateTime::<Utc>::from(signed_at) + request.expires_in.duration();

        debug!(
            "Generated presigned {} URL for s3://{}/{} expires at: {}",
            request.operation, request.bucket, request.key, expires_at
        );

        Ok(PresignedUrl {
            url,
            operation: request.operation,
            expires_at,
        })
    }

    async fn list_buckets(&self) -> StorageResult<Vec<Bucket>> {
        let response = self
            .s3_client
            .list_buckets()
            .send()
            .await
            .map_err(|e| StorageError::from_sdk(e, Target::bucket("")))?;

        let buckets: Vec<Bucket> = response
            .buckets()
            .iter()
            .filter_map(|bucket| {
                bucket.name().map(|name| Bucket {
                    name: name.to_string(),
                    region: bucket.bucket_region().map(ToString::to_string),
                    creation_date: bucket.creation_date().and_then(to_utc),
                })
            })
            .collect();

        for bucket in &buckets {
            if let Some(region) = &bucket.region {
                self.remember_region(&bucket.name, region).await;
            }
        }

        Ok(buckets)
    }

    fn list_objects(&self, bucket: &str) -> ObjectStream {
        stream::unfold(
            (self.clone(), bucket.to_string(), Listing::Start),
            |(store, bucket, listing)| async move {
                let token = match listing {
                    Listing::Start => None,
                    Listing::Next(token) => Some(token),
                    Listing::Done => return None,
                };
                let region = store.bucket_region(&bucket).await;

                let page = match store
                    .s3_client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .set_continuation_token(token)
                    .customize()
                    .config_override(region_override(region.as_deref()))
                    .send()
                    .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        let err = StorageError::from_sdk(e, Target::bucket(&bucket));
                        return Some((vec![Err(err)], (store, bucket, Listing::Done)));
                    }
                };

                let items: Vec<StorageResult<ObjectSummary>> =
                    page.contents().iter().map(|object| Ok(to_summary(object))).collect();
                let next = match page.next_continuation_token() {
                    Some(token) if page.is_truncated().unwrap_or_default() => {
                        Listing::Next(token.to_string())
                    }
                    _ => Listing::Done,
                };

                Some((items, (store, bucket, next)))
            },
        )
        .flat_map(stream::iter)
        .boxed()
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let region = self.bucket_region(bucket).await;
        debug!("Deleting s3://{bucket}/{key}");

        match self
            .s3_client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .customize()
            .config_override(region_override(region.as_deref()))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match StorageError::from_sdk(e, Target::object(bucket, key)) {
                err if err.is_not_found() => Ok(()),
                err => Err(err),
            },
        }
    }

    async fn delete_bucket(&self, name: &str) -> StorageResult<()> {
        let region = self.bucket_region(name).await;

        self.s3_client
            .delete_bucket()
            .bucket(name)
            .customize()
            .config_override(region_override(region.as_deref()))
            .send()
            .await
            .map_err(|e| StorageError::from_sdk(e, Target::bucket(name)))?;

        self.bucket_regions.write().await.remove(name);
        info!("Deleted bucket {name}");
        Ok(())
    }
}
