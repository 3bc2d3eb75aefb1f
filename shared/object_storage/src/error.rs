//! Error types for object storage operations

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Result type for object storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during object storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Bucket name is already taken, by this account or another one
    #[error("Bucket name already taken: {bucket}")]
    NameConflict {
        /// Requested bucket name
        bucket: String,
    },

    /// Region is not a supported location constraint
    #[error("Unsupported region: {region}")]
    InvalidRegion {
        /// Requested region code
        region: String,
    },

    /// Bucket name violates the provider naming rules
    #[error("Invalid bucket name {bucket:?}: {reason}")]
    InvalidBucketName {
        /// Rejected bucket name
        bucket: String,
        /// Rule that was violated
        reason: &'static str,
    },

    /// Bucket does not exist
    #[error("Bucket not found: {bucket}")]
    BucketNotFound {
        /// Bucket name
        bucket: String,
    },

    /// Bucket still holds objects
    #[error("Bucket is not empty: {bucket}")]
    BucketNotEmpty {
        /// Bucket name
        bucket: String,
    },

    /// Object does not exist
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },

    /// Caller is not allowed to perform the operation
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Service message
        message: String,
    },

    /// Request or payload could not be transferred
    #[error("Transfer failed: {message}")]
    TransferError {
        /// Transport message
        message: String,
    },

    /// Request could not be signed, usually because no credentials resolved
    #[error("Failed to sign request: {message}")]
    SigningError {
        /// Signer message
        message: String,
    },

    /// Presigned URL expiry is outside of `[1, 604800]` seconds
    #[error("Presigned URL expiry must be between 1 and 604800 seconds, got {seconds}")]
    InvalidExpiry {
        /// Requested expiry in seconds
        seconds: u64,
    },

    /// Upstream service error (5xx from S3)
    #[error("Upstream service error: {message}")]
    Upstream {
        /// Service message
        message: String,
    },

    /// Any other service error
    #[error("S3 service error {code}: {message}")]
    Service {
        /// Service error code
        code: String,
        /// Service message
        message: String,
    },
}

/// Resource a failed request was addressed to
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target<'a> {
    pub bucket: &'a str,
    pub key: Option<&'a str>,
    pub region: Option<&'a str>,
}

impl<'a> Target<'a> {
    pub(crate) const fn bucket(bucket: &'a str) -> Self {
        Self {
            bucket,
            key: None,
            region: None,
        }
    }

    pub(crate) const fn object(bucket: &'a str, key: &'a str) -> Self {
        Self {
            bucket,
            key: Some(key),
            region: None,
        }
    }

    pub(crate) const fn in_region(bucket: &'a str, region: &'a str) -> Self {
        Self {
            bucket,
            key: None,
            region: Some(region),
        }
    }
}

impl StorageError {
    /// Maps an S3 error code and HTTP status onto the error taxonomy
    pub(crate) fn from_service(
        code: Option<&str>,
        status: u16,
        message: Option<&str>,
        target: Target<'_>,
    ) -> Self {
        let message = message.unwrap_or_default().to_string();

        match code {
            Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou") => Self::NameConflict {
                bucket: target.bucket.to_string(),
            },
            Some("InvalidLocationConstraint" | "IllegalLocationConstraintException") => {
                Self::InvalidRegion {
                    region: target.region.unwrap_or_default().to_string(),
                }
            }
            Some("NoSuchBucket") => Self::BucketNotFound {
                bucket: target.bucket.to_string(),
            },
            Some("BucketNotEmpty") => Self::BucketNotEmpty {
                bucket: target.bucket.to_string(),
            },
            Some(
                "AccessDenied"
                | "AllAccessDisabled"
                | "InvalidAccessKeyId"
                | "SignatureDoesNotMatch",
            ) => Self::PermissionDenied { message },
            Some("NoSuchKey" | "NotFound") => Self::not_found(target),
            _ if status == 403 => Self::PermissionDenied { message },
            // HEAD responses carry no body, so a bare 404 is all we get
            None if status == 404 => Self::not_found(target),
            _ if status >= 500 => Self::Upstream { message },
            code => Self::Service {
                code: code.unwrap_or("Unknown").to_string(),
                message,
            },
        }
    }

    fn not_found(target: Target<'_>) -> Self {
        match target.key {
            Some(key) => Self::NotFound {
                bucket: target.bucket.to_string(),
                key: key.to_string(),
            },
            None => Self::BucketNotFound {
                bucket: target.bucket.to_string(),
            },
        }
    }

    /// Classifies an SDK error for the given target
    pub(crate) fn from_sdk<E>(error: SdkError<E>, target: Target<'_>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        match &error {
            SdkError::ServiceError(service_err) => Self::from_service(
                service_err.err().code(),
                service_err.raw().status().as_u16(),
                service_err.err().message(),
                target,
            ),
            SdkError::DispatchFailure(_)
            | SdkError::TimeoutError(_)
            | SdkError::ResponseError(_) => Self::TransferError {
                message: format!("{}", DisplayErrorContext(&error)),
            },
            _ => Self::Service {
                code: error.code().unwrap_or("Unknown").to_string(),
                message: format!("{}", DisplayErrorContext(&error)),
            },
        }
    }

    /// Whether the error means the object is already gone
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_name_conflict_codes() {
        for code in ["BucketAlreadyExists", "BucketAlreadyOwnedByYou"] {
            let err = StorageError::from_service(Some(code), 409, None, Target::bucket("taken"));
            assert_eq!(
                err,
                StorageError::NameConflict {
                    bucket: "taken".to_string()
                }
            );
        }
    }

    #[test]
    fn test_invalid_location_constraint_carries_region() {
        let err = StorageError::from_service(
            Some("InvalidLocationConstraint"),
            400,
            Some("The specified location-constraint is not valid"),
            Target::in_region("bucket", "mars-north-1"),
        );
        assert_eq!(
            err,
            StorageError::InvalidRegion {
                region: "mars-north-1".to_string()
            }
        );
    }

    #[test]
    fn test_missing_key_vs_missing_bucket() {
        let err = StorageError::from_service(
            Some("NoSuchKey"),
            404,
            None,
            Target::object("bucket", "a/b.txt"),
        );
        assert!(err.is_not_found());

        let err =
            StorageError::from_service(Some("NoSuchBucket"), 404, None, Target::object("b", "k"));
        assert_eq!(
            err,
            StorageError::BucketNotFound {
                bucket: "b".to_string()
            }
        );

        // Bare 404 on a bucket-level request
        let err = StorageError::from_service(None, 404, None, Target::bucket("b"));
        assert_eq!(
            err,
            StorageError::BucketNotFound {
                bucket: "b".to_string()
            }
        );
    }

    #[test]
    fn test_bucket_not_empty() {
        let err =
            StorageError::from_service(Some("BucketNotEmpty"), 409, None, Target::bucket("full"));
        assert_eq!(
            err,
            StorageError::BucketNotEmpty {
                bucket: "full".to_string()
            }
        );
    }

    #[test]
    fn test_permission_and_upstream_by_status() {
        let err = StorageError::from_service(
            Some("AccessDenied"),
            403,
            Some("Access Denied"),
            Target::bucket("b"),
        );
        assert_eq!(
            err,
            StorageError::PermissionDenied {
                message: "Access Denied".to_string()
            }
        );

        let err = StorageError::from_service(None, 403, None, Target::bucket("b"));
        assert!(matches!(err, StorageError::PermissionDenied { .. }));

        let err = StorageError::from_service(
            Some("InternalError"),
            500,
            Some("We encountered an internal error"),
            Target::bucket("b"),
        );
        assert!(matches!(err, StorageError::Upstream { .. }));
    }

    #[test]
    fn test_unknown_code_is_preserved() {
        let err = StorageError::from_service(
            Some("InvalidArgument"),
            400,
            Some("bad"),
            Target::bucket("b"),
        );
        assert_eq!(
            err,
            StorageError::Service {
                code: "InvalidArgument".to_string(),
                message: "bad".to_string()
            }
        );
    }
}
