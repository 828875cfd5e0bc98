use storage_api_http::{DropOptions, Stage, StorageClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = StorageClient::from_env()?;

    let token = client.verify_token().await?;
    println!("authenticated as token {}", token.id);

    let bucket = client
        .create_bucket("demo", Stage::In, Some("created by the basic demo"))
        .await?;

    for bucket in client.list_buckets().await? {
        println!("{} ({})", bucket.id, bucket.stage);
    }

    client
        .drop_bucket(
            &bucket.id,
            DropOptions {
                force: true,
                is_async: true,
            },
        )
        .await?;

    Ok(())
}
