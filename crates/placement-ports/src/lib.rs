//! Integration ports for the placement server.
//!
//! Implement these traits in your own crate to plug in custom persistence without
//! forking.

pub mod blob;
pub mod storage;

pub use blob::*;
pub use storage::*;
