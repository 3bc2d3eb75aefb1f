//! Bucket, object and presigned URL types

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use aws_sdk_s3::types::BucketLocationConstraint;
use chrono::{DateTime, Utc};
use strum::Display;

use crate::error::{StorageError, StorageResult};

/// Region that must be sent without a location constraint
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default presigned URL lifetime (one hour)
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 60 * 60;

/// Longest presigned URL lifetime the signer accepts (one week)
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// A bucket owned by the authenticated principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Globally unique bucket name
    pub name: String,
    /// Region the bucket was created in, when known
    pub region: Option<String>,
    /// When the bucket was created, when reported by the service
    pub creation_date: Option<DateTime<Utc>>,
}

/// Object entry returned by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Object key
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub last_modified: Option<DateTime<Utc>>,
    /// Entity tag
    pub etag: Option<String>,
}

/// Payload for a put request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
    /// In-memory bytes
    Bytes(Vec<u8>),
    /// Local file, streamed from disk
    File(PathBuf),
}

impl From<Vec<u8>> for ObjectBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for ObjectBody {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<&str> for ObjectBody {
    fn from(text: &str) -> Self {
        Self::Bytes(text.as_bytes().to_vec())
    }
}

impl From<PathBuf> for ObjectBody {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

/// Operation a presigned URL grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum PresignOperation {
    /// Download the object
    Get,
    /// Upload the object
    Put,
}

/// Presigned URL lifetime, guaranteed to be within `[1, 604800]` seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresignExpiry(Duration);

impl PresignExpiry {
    /// Validates an expiry given in seconds
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidExpiry` if `seconds` is zero or longer than one week
    pub fn from_secs(seconds: u64) -> StorageResult<Self> {
        if seconds == 0 || seconds > MAX_PRESIGN_EXPIRY_SECS {
            return Err(StorageError::InvalidExpiry { seconds });
        }
        Ok(Self(Duration::from_secs(seconds)))
    }

    /// Expiry as a duration
    #[must_use]
    pub const fn duration(self) -> Duration {
        self.0
    }

    /// Expiry in whole seconds
    #[must_use]
    pub const fn as_secs(self) -> u64 {
        self.0.as_secs()
    }
}

impl Default for PresignExpiry {
    fn default() -> Self {
        Self(Duration::from_secs(DEFAULT_PRESIGN_EXPIRY_SECS))
    }
}

/// Parameters for signing a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignRequest {
    /// Bucket name
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Granted operation
    pub operation: PresignOperation,
    /// URL lifetime
    pub expires_in: PresignExpiry,
    /// Signing time; the current time when unset
    pub signed_at: Option<SystemTime>,
}

impl PresignRequest {
    /// Creates a request signed at the current time
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        operation: PresignOperation,
        expires_in: PresignExpiry,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            operation,
            expires_in,
            signed_at: None,
        }
    }

    /// Pins the signing time, which makes the resulting URL deterministic
    #[must_use]
    pub fn signed_at(mut self, signed_at: SystemTime) -> Self {
        self.signed_at = Some(signed_at);
        self
    }

    pub(crate) fn signing_time(&self) -> SystemTime {
        self.signed_at.unwrap_or_else(SystemTime::now)
    }
}

/// Presigned URL with expiration information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    /// The presigned URL
    pub url: String,
    /// Operation the URL grants
    pub operation: PresignOperation,
    /// UTC timestamp when the URL expires
    pub expires_at: DateTime<Utc>,
}

impl fmt::Display for PresignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Resolves the location constraint to send with a create-bucket request
///
/// `us-east-1` maps to `None` since S3 rejects it as an explicit constraint.
///
/// # Errors
///
/// Returns `StorageError::InvalidRegion` for region codes S3 does not know
pub fn location_constraint(region: &str) -> StorageResult<Option<BucketLocationConstraint>> {
    if region == DEFAULT_REGION {
        return Ok(None);
    }

    if BucketLocationConstraint::values().contains(&region) {
        Ok(Some(BucketLocationConstraint::from(region)))
    } else {
        Err(StorageError::InvalidRegion {
            region: region.to_string(),
        })
    }
}

/// Checks a bucket name against the S3 naming rules
///
/// See <https://docs.aws.amazon.com/AmazonS3/latest/userguide/bucketnamingrules.html>
///
/// # Errors
///
/// Returns `StorageError::InvalidBucketName` naming the first violated rule
pub fn validate_bucket_name(name: &str) -> StorageResult<()> {
    let invalid = |reason: &'static str| -> StorageResult<()> {
        Err(StorageError::InvalidBucketName {
            bucket: name.to_string(),
            reason,
        })
    };

    if !(3..=63).contains(&name.len()) {
        return invalid("must be between 3 and 63 characters long");
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return invalid("may only contain lowercase letters, digits, dots and hyphens");
    }
    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let bytes = name.as_bytes();
    if !is_alnum(bytes[0]) || !is_alnum(bytes[bytes.len() - 1]) {
        return invalid("must begin and end with a letter or digit");
    }
    if name.contains("..") {
        return invalid("must not contain two adjacent dots");
    }
    if name.parse::<std::net::Ipv4Addr>().is_ok() {
        return invalid("must not be formatted as an IP address");
    }

    Ok(())
}

/// Generates a globally unique bucket name such as `test-<uuid>`
#[must_use]
pub fn unique_bucket_name(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

/// Converts an SDK timestamp into a chrono timestamp
pub(crate) fn to_utc(date: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(date.secs(), date.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presign_expiry_bounds() {
        assert!(PresignExpiry::from_secs(1).is_ok());
        assert!(PresignExpiry::from_secs(MAX_PRESIGN_EXPIRY_SECS).is_ok());
        assert_eq!(
            PresignExpiry::from_secs(0),
            Err(StorageError::InvalidExpiry { seconds: 0 })
        );
        assert_eq!(
            PresignExpiry::from_secs(604_801),
            Err(StorageError::InvalidExpiry { seconds: 604_801 })
        );
        assert_eq!(PresignExpiry::default().as_secs(), 3600);
    }

    #[test]
    fn test_location_constraint() {
        assert_eq!(location_constraint("us-east-1"), Ok(None));
        assert_eq!(
            location_constraint("ap-northeast-1"),
            Ok(Some(BucketLocationConstraint::ApNortheast1))
        );
        assert_eq!(
            location_constraint("eu-west-1"),
            Ok(Some(BucketLocationConstraint::EuWest1))
        );
        assert_eq!(
            location_constraint("mars-north-1"),
            Err(StorageError::InvalidRegion {
                region: "mars-north-1".to_string()
            })
        );
    }

    #[test]
    fn test_valid_bucket_names() {
        let longest = "a".repeat(63);
        for name in ["test-abc123", "my.bucket.name", "abc", longest.as_str()] {
            assert!(validate_bucket_name(name).is_ok(), "{name} should be valid");
        }
        assert!(validate_bucket_name(&unique_bucket_name("test")).is_ok());
    }

    #[test]
    fn test_invalid_bucket_names() {
        let too_long = "a".repeat(64);
        for name in [
            "ab",
            too_long.as_str(),
            "Upper-Case",
            "under_score",
            "-leading",
            "trailing-",
            "double..dot",
            "192.168.5.4",
        ] {
            assert!(
                matches!(
                    validate_bucket_name(name),
                    Err(StorageError::InvalidBucketName { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_presign_operation_display() {
        assert_eq!(PresignOperation::Get.to_string(), "GET");
        assert_eq!(PresignOperation::Put.to_string(), "PUT");
    }
}
