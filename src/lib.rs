//! Library exports.
//!
//! The server is split into workspace crates; this facade keeps one import path for
//! additional binaries (e.g. the OpenAPI exporter) and for integration tests.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod storage;
pub mod telemetry;

pub use placement_server::{run, AppContext};
