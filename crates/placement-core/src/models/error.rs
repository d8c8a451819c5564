use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[cfg(feature = "actix")]
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// Stable machine-readable error codes carried in every error body.
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const UNAVAILABLE: &str = "unavailable";
    pub const SERVER_ERROR: &str = "server_error";
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlacementError {
    pub success: bool,
    pub error: String,
    pub message: String,
    /// Debug chain of the underlying failure. Only rendered outside production.
    #[serde(skip)]
    pub trace: Option<String>,
}

impl PlacementError {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(codes::VALIDATION_FAILED, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(codes::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(codes::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(codes::UNAVAILABLE, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(codes::SERVER_ERROR, message)
    }

    /// Wrap an unexpected failure, keeping its debug representation as the trace.
    pub fn internal<E: fmt::Debug + fmt::Display>(err: E) -> Self {
        Self::server_error(err.to_string()).with_trace(format!("{err:?}"))
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.error == codes::NOT_FOUND
    }

    pub fn is_validation(&self) -> bool {
        self.error == codes::VALIDATION_FAILED
    }

    /// HTTP status associated with the error code.
    pub fn status(&self) -> u16 {
        match self.error.as_str() {
            codes::VALIDATION_FAILED => 400,
            codes::UNAUTHORIZED => 401,
            codes::FORBIDDEN => 403,
            codes::NOT_FOUND => 404,
            codes::UNAVAILABLE => 503,
            _ => 500,
        }
    }
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for PlacementError {}

#[cfg(feature = "actix")]
impl ResponseError for PlacementError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

impl From<serde_json::Error> for PlacementError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err)
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for PlacementError {
    fn from(err: sqlx::Error) -> Self {
        // Provide a stable, non-leaky mapping for common constraint violations.
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code().unwrap_or_default();
            let msg = db_err.message();

            // Postgres unique violation: 23505
            // SQLite constraint error codes vary by extended code; also match by message.
            let is_unique = code == "23505"
                || code == "2067"
                || code == "1555"
                || msg.contains("UNIQUE constraint failed")
                || msg.contains("duplicate key");

            if is_unique {
                return Self::validation("duplicate key");
            }
        }

        Self::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_statuses() {
        assert_eq!(PlacementError::validation("x").status(), 400);
        assert_eq!(PlacementError::unauthorized("x").status(), 401);
        assert_eq!(PlacementError::forbidden("x").status(), 403);
        assert_eq!(PlacementError::not_found("x").status(), 404);
        assert_eq!(PlacementError::unavailable("x").status(), 503);
        assert_eq!(PlacementError::server_error("x").status(), 500);
        assert_eq!(PlacementError::new("something_else", "x").status(), 500);
    }

    #[test]
    fn trace_is_never_serialized() {
        let err = PlacementError::internal(std::io::Error::other("disk on fire"));
        assert!(err.trace.is_some());

        let body = serde_json::to_value(&err).expect("serialize error");
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "server_error");
        assert_eq!(body["message"], "disk on fire");
        assert!(body.get("trace").is_none());
    }
}
