//! Framework-agnostic placement domain types and helpers.
//!
//! Users, profiles, blob references, pagination and the profile update allow-list live
//! here so that storage adapters and the HTTP layer agree on one set of rules.

pub mod models;

pub use models::*;
