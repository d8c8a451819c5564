use placement_ports::{Storage, UserStore};
use rust_placement_server::storage::{create_storage, db_system_for};

#[cfg(not(feature = "mongo"))]
#[tokio::test]
async fn mongo_urls_fail_fast_without_the_mongo_feature() {
    let err = match create_storage("mongodb://localhost:27017/placement_test", "avatars").await {
        Ok(_) => panic!("mongo backend should be unavailable in this build"),
        Err(err) => err,
    };

    assert_eq!(err.error, "server_error");
    assert!(
        err.to_string().contains("built without the `mongo` feature"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn storage_factory_builds_observed_sqlite_backend() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("factory.db").display());
    assert_eq!(db_system_for(&url), "sqlite");

    let storage = create_storage(&url, "avatars").await?;
    storage.init().await?;
    storage.healthcheck().await?;
    assert!(storage.find_user("nobody").await?.is_none());
    storage.shutdown().await?;

    Ok(())
}
