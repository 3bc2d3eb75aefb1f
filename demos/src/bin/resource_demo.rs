//! Uploads a local file, shares it through a presigned URL, then tears the
//! bucket down once the operator confirms.
//!
//! Usage: `resource-demo [FILE]`, uploading `S3.pdf` when no file is given.

use std::env;

use anyhow::Context;
use object_storage::{unique_bucket_name, ObjectBody, StdinConfirmation, Teardown};
use storage_demos::{bootstrap, upload_path};
use tracing::info;

const OBJECT_KEY: &str = "Result/Converted.pdf";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (environment, client) = bootstrap().await;

    let bucket_name = unique_bucket_name("test");
    let region = environment.bucket_region();
    client
        .create_bucket(&bucket_name, &region)
        .await
        .with_context(|| format!("Failed to create bucket {bucket_name} in {region}"))?;

    // Uploaded as raw bytes; a text-mode copy would corrupt the PDF
    let source = upload_path(env::args_os());
    client
        .put_object(&bucket_name, OBJECT_KEY, ObjectBody::File(source.clone()))
        .await
        .with_context(|| format!("Failed to upload {}", source.display()))?;
    println!("\nUploaded a local PDF file to S3.");

    if let Some(url) = client.share_object(&bucket_name, OBJECT_KEY).await {
        println!("\nTry this pre-signed url to access the object temporarily:\n{url}");
    }

    match client
        .empty_and_delete_bucket(&bucket_name, &StdinConfirmation)
        .await?
    {
        Teardown::Deleted { objects_deleted } => {
            info!("Deleted {objects_deleted} objects and bucket {bucket_name}");
        }
        Teardown::Declined => {
            println!("\nLeaving bucket {bucket_name} in place.");
        }
    }

    Ok(())
}
