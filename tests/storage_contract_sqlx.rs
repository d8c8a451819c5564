mod common;

use placement_ports::Storage;
use rust_placement_server::storage::sqlx::SqlxStorage;

/// A file-backed SQLite database: `:memory:` would give every pooled connection its own
/// empty database.
#[tokio::test]
async fn sqlx_storage_contract() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("placement_test.db");

    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = SqlxStorage::new(&url).await?;
    storage
        .init()
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    common::run_storage_contract(&storage).await?;

    storage
        .shutdown()
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(())
}

#[tokio::test]
async fn sqlx_init_is_idempotent_and_buckets_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
    use placement_core::NewBlob;
    use placement_ports::BlobStore;

    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("buckets.db").display());

    let avatars = SqlxStorage::new(&url).await?;
    avatars.init().await?;
    avatars.init().await?;

    let documents = SqlxStorage::new(&url).await?.with_bucket("documents");

    let id = avatars
        .upload(&NewBlob::new("a.png", "image/png", vec![1, 2, 3]))
        .await?;

    assert!(documents.open_download(&id).await?.is_none());
    assert!(!documents.delete(&id).await?);
    assert!(avatars.open_download(&id).await?.is_some());

    Ok(())
}
