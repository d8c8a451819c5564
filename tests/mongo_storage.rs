#![cfg(feature = "mongo")]

use std::time::Duration;

use placement_ports::Storage;
use rust_placement_server::storage::mongo::MongoStorage;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner};
use testcontainers_modules::mongo::Mongo;

mod common;

fn docker_enabled() -> bool {
    std::env::var("RUN_TESTCONTAINERS").as_deref() == Ok("1")
}

/// Keep dialing until the server answers a ping.
async fn connect(uri: &str, bucket: &str) -> Result<MongoStorage, std::io::Error> {
    let mut last_error = String::from("never attempted");
    for _ in 0..30 {
        match MongoStorage::with_bucket(uri, bucket).await {
            Ok(storage) => match storage.healthcheck().await {
                Ok(()) => return Ok(storage),
                Err(e) => last_error = e.to_string(),
            },
            Err(e) => last_error = e.to_string(),
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    Err(std::io::Error::other(format!(
        "mongo container never became ready: {last_error}"
    )))
}

// Users collection plus GridFS avatars against a throwaway container.
// Needs Docker, so it only runs with RUN_TESTCONTAINERS=1.
#[tokio::test]
async fn mongo_backend_satisfies_storage_contract() -> Result<(), Box<dyn std::error::Error>> {
    if !docker_enabled() {
        eprintln!("skipping: set RUN_TESTCONTAINERS=1 to run mongo storage tests");
        return Ok(());
    }

    let container = Mongo::default().start().await?;
    let uri = format!(
        "mongodb://{}:{}/placement_test",
        container.get_host().await?,
        container.get_host_port_ipv4(27017.tcp()).await?
    );

    let storage = connect(&uri, "avatars").await?;
    storage.init().await?;
    // Index creation is idempotent.
    storage.init().await?;

    common::run_storage_contract(&storage).await?;

    storage.shutdown().await?;
    Ok(())
}
