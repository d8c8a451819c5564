use actix_web::{
    dev::ServiceResponse,
    http::StatusCode,
    middleware::{ErrorHandlerResponse, ErrorHandlers},
    web, HttpResponse,
};
use serde_json::json;

use placement_core::{codes, PlacementError};

/// Fallback renderer for 5xx responses.
///
/// Errors raised as `PlacementError` already carry the JSON body; this rewrites every
/// other server error into the same `{success, error, message}` shape. With
/// `expose_trace` the error's debug chain is attached as `trace`.
pub fn error_fallback<B: 'static>(expose_trace: bool) -> ErrorHandlers<B> {
    ErrorHandlers::new().default_handler_server(move |res| render_server_error(res, expose_trace))
}

fn render_server_error<B>(
    res: ServiceResponse<B>,
    expose_trace: bool,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let status = res.status();

    let (message, trace) = match res.response().error() {
        Some(err) => match err.as_error::<PlacementError>() {
            Some(placement) => (placement.message.clone(), placement.trace.clone()),
            None => (err.to_string(), Some(format!("{err:?}"))),
        },
        None => (
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string(),
            None,
        ),
    };

    let code = if status == StatusCode::SERVICE_UNAVAILABLE {
        codes::UNAVAILABLE
    } else {
        codes::SERVER_ERROR
    };

    tracing::error!(status = status.as_u16(), error = code, %message, "request failed");

    let mut body = json!({
        "success": false,
        "error": code,
        "message": message,
    });
    if expose_trace {
        if let Some(trace) = trace {
            body["trace"] = json!(trace);
        }
    }

    let (req, _) = res.into_parts();
    let response = HttpResponse::build(status).json(body);
    let res = ServiceResponse::new(req, response).map_into_right_body();

    Ok(ErrorHandlerResponse::Response(res))
}

/// JSON body extractor config mapping payload errors to `validation_failed`.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| PlacementError::validation(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| PlacementError::validation(err.to_string()).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| PlacementError::validation(err.to_string()).into())
}

/// Default service for unknown routes.
pub async fn not_found() -> Result<HttpResponse, PlacementError> {
    Err(PlacementError::not_found("Route not found"))
}
