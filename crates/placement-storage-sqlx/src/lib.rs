//! SQLx storage adapter (SQLite / Postgres).
//!
//! Users are stored as JSON documents next to the few columns the listing queries
//! filter on; avatar blobs are stored as bytes in a `blobs` table.

mod store;

pub use store::SqlxStorage;
