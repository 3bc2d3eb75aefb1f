//! Shared setup for the object storage demos

use std::ffi::OsString;
use std::path::PathBuf;

use object_storage::{Environment, ObjectStorageClient};
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

/// Initializes logging and builds an S3 client for the current environment
///
/// Uses JSON logs for staging/production and plain text for development.
pub async fn bootstrap() -> (Environment, ObjectStorageClient) {
    let environment = Environment::from_env();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(environment.tracing_level()).into())
        .from_env_lossy();

    if environment.json_logs() {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let client = ObjectStorageClient::from_environment(&environment).await;
    (environment, client)
}

/// File uploaded by `resource-demo` when no path is given
pub const DEFAULT_UPLOAD_FILE: &str = "S3.pdf";

/// Picks the upload file from the command line: the first argument after the
/// program name, or [`DEFAULT_UPLOAD_FILE`]
pub fn upload_path(mut args: impl Iterator<Item = OsString>) -> PathBuf {
    args.nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_UPLOAD_FILE), PathBuf::from)
}
