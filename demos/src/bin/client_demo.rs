//! Creates a bucket, writes one object, finds the bucket in the account
//! listing and cleans up again.

use anyhow::Context;
use object_storage::unique_bucket_name;
use storage_demos::bootstrap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (environment, client) = bootstrap().await;

    // Bucket names live in one global namespace
    let bucket_name = unique_bucket_name("is-globally-unique");
    client
        .create_bucket(&bucket_name, &environment.bucket_region())
        .await
        .context("Failed to create bucket")?;

    client
        .put_object(&bucket_name, "Hello.txt", "Hello World!")
        .await
        .context("Failed to upload Hello.txt")?;

    for bucket in client.list_buckets().await? {
        if bucket.name == bucket_name {
            let since = bucket
                .creation_date
                .map_or_else(|| "an unknown date".to_string(), |date| date.to_rfc3339());
            println!("(Just created) --> {} - there since {since}", bucket.name);
        }
    }

    // Buckets cannot be deleted unless they're empty
    client.delete_object(&bucket_name, "Hello.txt").await?;
    client.delete_bucket(&bucket_name).await?;

    Ok(())
}
