//! Object storage client for S3 and S3-compatible services
//!
//! [`ObjectStorageClient`] wraps an [`ObjectStore`] backend and exposes bucket
//! and object lifecycle operations plus presigned URL generation. Credentials,
//! retries and signing are left to the AWS SDK.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

mod client;
mod confirm;
mod environment;
mod error;
mod memory;
mod s3;
mod store;
mod types;

pub use client::{ObjectStorageClient, Teardown};
pub use confirm::{Confirmation, StdinConfirmation};
pub use environment::{Environment, DEFAULT_BUCKET_REGION, LOCALSTACK_ENDPOINT};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
pub use store::{ObjectStore, ObjectStream};
pub use types::{
    location_constraint, unique_bucket_name, validate_bucket_name, Bucket, ObjectBody,
    ObjectSummary, PresignExpiry, PresignOperation, PresignRequest, PresignedUrl,
    DEFAULT_PRESIGN_EXPIRY_SECS, DEFAULT_REGION, MAX_PRESIGN_EXPIRY_SECS,
};
