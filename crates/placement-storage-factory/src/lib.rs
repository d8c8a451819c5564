//! Storage backend selection for the placement server.
//!
//! This crate centralizes URL-based backend selection (SQLx vs Mongo) and wraps
//! the chosen implementation with `ObservedStorage` for tracing.

use std::sync::Arc;

use placement_core::PlacementError;

pub use placement_observability::ObservedStorage;
pub use placement_ports::{DynStorage, Storage};

pub mod sqlx {
    pub use placement_storage_sqlx::SqlxStorage;
}

#[cfg(feature = "mongo")]
pub mod mongo {
    pub use placement_storage_mongo::MongoStorage;
}

fn is_mongo_url(database_url: &str) -> bool {
    database_url.starts_with("mongodb://") || database_url.starts_with("mongodb+srv://")
}

/// The `db.system` label recorded on storage spans for a connection URL.
pub fn db_system_for(database_url: &str) -> &'static str {
    if is_mongo_url(database_url) {
        "mongodb"
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")
    {
        "postgresql"
    } else if database_url.starts_with("sqlite:") {
        "sqlite"
    } else {
        "sql"
    }
}

/// Create a storage backend based on URL scheme.
///
/// Supported:
/// - `postgres://...` and `sqlite:...` -> SQLx backend
/// - `mongodb://...` and `mongodb+srv://...` -> Mongo backend (requires `--features mongo`)
///
/// Avatar blobs are kept in `blob_bucket` (a GridFS bucket for Mongo, a namespace
/// column for SQL).
pub async fn create_storage(
    database_url: &str,
    blob_bucket: &str,
) -> Result<DynStorage, PlacementError> {
    if is_mongo_url(database_url) {
        #[cfg(feature = "mongo")]
        {
            let storage = mongo::MongoStorage::with_bucket(database_url, blob_bucket).await?;
            let inner: DynStorage = Arc::new(storage);
            let observed = ObservedStorage::new(inner, db_system_for(database_url).to_string());
            return Ok(Arc::new(observed));
        }

        #[cfg(not(feature = "mongo"))]
        {
            return Err(PlacementError::server_error(
                "MongoDB backend requested but the binary was built without the `mongo` feature",
            ));
        }
    }

    // Default to SQLx backend for sqlite/postgres.
    let storage = placement_storage_sqlx::SqlxStorage::new(database_url)
        .await?
        .with_bucket(blob_bucket);

    let inner: DynStorage = Arc::new(storage);
    let observed = ObservedStorage::new(inner, db_system_for(database_url).to_string());
    Ok(Arc::new(observed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_system_follows_url_scheme() {
        assert_eq!(db_system_for("mongodb://localhost:27017/placement"), "mongodb");
        assert_eq!(db_system_for("mongodb+srv://cluster.example.com"), "mongodb");
        assert_eq!(db_system_for("postgres://u:p@localhost/db"), "postgresql");
        assert_eq!(db_system_for("postgresql://localhost/db"), "postgresql");
        assert_eq!(db_system_for("sqlite:placement.db?mode=rwc"), "sqlite");
        assert_eq!(db_system_for("mysql://localhost/db"), "sql");
    }
}
