//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{timeout::TimeoutConfig, BehaviorVersion, Region};
use tracing::Level;

use crate::types::PresignExpiry;

/// Region new buckets are created in unless `BUCKET_REGION` says otherwise
pub const DEFAULT_BUCKET_REGION: &str = "ap-northeast-1";

/// `LocalStack` endpoint used during development
pub const LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development {
        /// Optional override for presigned URL expiry in seconds
        presign_expiry_override: Option<u64>,
    },
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => {
                let presign_expiry_override = env::var("PRESIGNED_URL_EXPIRY_SECS")
                    .ok()
                    .and_then(|val| val.parse::<u64>().ok());

                Self::Development {
                    presign_expiry_override,
                }
            }
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Region to create buckets in
    #[must_use]
    pub fn bucket_region(&self) -> String {
        env::var("BUCKET_REGION").unwrap_or_else(|_| DEFAULT_BUCKET_REGION.to_string())
    }

    /// Returns the endpoint URL to use for AWS services
    ///
    /// `AWS_ENDPOINT_URL` wins in every environment; development otherwise
    /// targets `LocalStack`.
    #[must_use]
    pub fn override_aws_endpoint_url(&self) -> Option<String> {
        env::var("AWS_ENDPOINT_URL").ok().or_else(|| match self {
            Self::Production | Self::Staging => None,
            Self::Development { .. } => Some(LOCALSTACK_ENDPOINT.to_string()),
        })
    }

    /// AWS configuration resolved through the default credential chain
    ///
    /// Credentials come from the environment, the shared credentials file or
    /// instance-role metadata, in that order. Retries stay at the SDK default.
    pub async fn aws_config(&self) -> aws_config::SdkConfig {
        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut config_builder = aws_config::load_defaults(BehaviorVersion::latest())
            .await
            .to_builder()
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = self.override_aws_endpoint_url() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }

    /// AWS S3 service configuration
    ///
    /// Without a region from the credential chain, the client talks to the
    /// bucket region.
    pub async fn s3_client_config(&self) -> aws_sdk_s3::Config {
        let aws_config = self.aws_config().await;
        let s3_config: aws_sdk_s3::Config = (&aws_config).into();
        let mut builder = s3_config.to_builder();

        if s3_config.region().is_none() {
            builder.set_region(Some(Region::new(self.bucket_region())));
        }

        // Override "force path style" to true for compatibility with LocalStack
        // https://github.com/awslabs/aws-sdk-rust/discussions/874
        if matches!(self, Self::Development { .. }) {
            builder.set_force_path_style(Some(true));
        }

        builder.build()
    }

    /// Presigned URL expiry
    ///
    /// Overrides outside of `[1, 604800]` seconds fall back to one hour.
    #[must_use]
    pub fn presign_expiry(&self) -> PresignExpiry {
        match self {
            Self::Production | Self::Staging => PresignExpiry::default(),
            Self::Development {
                presign_expiry_override,
            } => presign_expiry_override
                .and_then(|secs| PresignExpiry::from_secs(secs).ok())
                .unwrap_or_default(),
        }
    }

    /// Log level, from `TRACING_LEVEL` when it parses
    #[must_use]
    pub fn tracing_level(&self) -> Level {
        env::var("TRACING_LEVEL")
            .ok()
            .and_then(|val| val.parse::<Level>().ok())
            .unwrap_or(match self {
                Self::Production | Self::Staging => Level::INFO,
                Self::Development { .. } => Level::DEBUG,
            })
    }

    /// Whether logs should be emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_environment_from_env() {
        env::remove_var("APP_ENV");
        env::remove_var("PRESIGNED_URL_EXPIRY_SECS");
        assert_eq!(
            Environment::from_env(),
            Environment::Development {
                presign_expiry_override: None
            }
        );

        env::set_var("APP_ENV", " Staging ");
        assert_eq!(Environment::from_env(), Environment::Staging);

        env::set_var("APP_ENV", "production");
        assert_eq!(Environment::from_env(), Environment::Production);

        env::remove_var("APP_ENV");
    }

    #[test]
    #[serial]
    #[should_panic(expected = "Invalid environment: invalid")]
    fn test_invalid_environment() {
        env::set_var("APP_ENV", "invalid");
        let _ = Environment::from_env();
    }

    #[test]
    #[serial]
    fn test_presign_expiry() {
        let env = Environment::Development {
            presign_expiry_override: None,
        };
        assert_eq!(env.presign_expiry().as_secs(), 3600);

        let env = Environment::Development {
            presign_expiry_override: Some(30),
        };
        assert_eq!(env.presign_expiry().as_secs(), 30);

        // Out of range overrides fall back to the default
        for secs in [0, 604_801] {
            let env = Environment::Development {
                presign_expiry_override: Some(secs),
            };
            assert_eq!(env.presign_expiry().as_secs(), 3600);
        }

        assert_eq!(Environment::Production.presign_expiry().as_secs(), 3600);
    }

    #[test]
    #[serial]
    fn test_development_with_env_override() {
        env::set_var("APP_ENV", "development");
        env::set_var("PRESIGNED_URL_EXPIRY_SECS", "120");

        let env = Environment::from_env();
        assert_eq!(env.presign_expiry().as_secs(), 120);

        env::set_var("PRESIGNED_URL_EXPIRY_SECS", "invalid");
        assert_eq!(
            Environment::from_env(),
            Environment::Development {
                presign_expiry_override: None
            }
        );

        env::remove_var("PRESIGNED_URL_EXPIRY_SECS");
        env::remove_var("APP_ENV");
    }

    #[test]
    #[serial]
    fn test_endpoint_and_region() {
        env::remove_var("AWS_ENDPOINT_URL");
        env::remove_var("BUCKET_REGION");

        assert_eq!(Environment::Production.override_aws_endpoint_url(), None);
        let dev = Environment::Development {
            presign_expiry_override: None,
        };
        assert_eq!(
            dev.override_aws_endpoint_url().as_deref(),
            Some(LOCALSTACK_ENDPOINT)
        );
        assert_eq!(dev.bucket_region(), "ap-northeast-1");

        env::set_var("AWS_ENDPOINT_URL", "http://minio:9000");
        env::set_var("BUCKET_REGION", "eu-west-1");
        assert_eq!(
            Environment::Staging.override_aws_endpoint_url().as_deref(),
            Some("http://minio:9000")
        );
        assert_eq!(Environment::Staging.bucket_region(), "eu-west-1");

        env::remove_var("AWS_ENDPOINT_URL");
        env::remove_var("BUCKET_REGION");
    }

    #[test]
    #[serial]
    fn test_tracing_level() {
        env::remove_var("TRACING_LEVEL");
        assert_eq!(Environment::Production.tracing_level(), Level::INFO);
        assert!(Environment::Staging.json_logs());

        env::set_var("TRACING_LEVEL", "warn");
        assert_eq!(Environment::Production.tracing_level(), Level::WARN);
        env::remove_var("TRACING_LEVEL");
    }
}
