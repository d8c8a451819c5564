pub mod auth;
pub mod errors;

pub use auth::{Authenticate, Caller, RequireRole};
pub use errors::{error_fallback, json_config, not_found, path_config, query_config};
