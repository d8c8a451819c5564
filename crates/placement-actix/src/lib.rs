//! Actix-web HTTP surface for the placement server.
//!
//! Handlers and middleware only. Domain rules live in `placement-core`; persistence is
//! reached through the `placement-ports` traits.

pub mod handlers;
pub mod middleware;
pub mod settings;

pub use settings::AppSettings;
