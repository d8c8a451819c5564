use actix_web::{web, HttpResponse};
use serde_json::{Map, Value};

use placement_core::{PlacementError, ProfileUpdate, ProfileUpdateResponse, UserResponse, UserView};
use placement_ports::{DynStorage, UserStore};

use crate::middleware::Caller;

/// Fetch a user's profile by id.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/user/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile of the user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = PlacementError),
        (status = 404, description = "No such user", body = PlacementError)
    ),
    security(("bearer" = []))
))]
pub async fn get_user(
    id: web::Path<String>,
    db: web::Data<DynStorage>,
) -> Result<HttpResponse, PlacementError> {
    let user = db
        .find_user(&id)
        .await?
        .ok_or_else(|| PlacementError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(UserResponse::new(UserView::from(&user))))
}

/// Apply an allow-listed partial update to the caller's own profile.
///
/// The body is a flat object keyed by dotted field paths (`profile.phone`, ...). Any key
/// outside the allow-list rejects the whole request before the store is touched.
#[cfg_attr(feature = "openapi", utoipa::path(
    patch,
    path = "/user",
    tag = "Users",
    request_body(content = Object, description = "Flat map of dotted field paths to new values"),
    responses(
        (status = 200, description = "Updated profile", body = ProfileUpdateResponse),
        (status = 400, description = "Disallowed key or malformed value", body = PlacementError),
        (status = 401, description = "Missing or invalid token", body = PlacementError),
        (status = 404, description = "Caller has no user record", body = PlacementError)
    ),
    security(("bearer" = []))
))]
pub async fn update_profile(
    caller: Caller,
    changes: web::Json<Map<String, Value>>,
    db: web::Data<DynStorage>,
) -> Result<HttpResponse, PlacementError> {
    let update = ProfileUpdate::from_map(changes.into_inner())?;

    let user = db
        .find_user(&caller.user_id)
        .await?
        .ok_or_else(|| PlacementError::not_found("User not found"))?;

    let updated = update.apply(&user)?;
    if !db.replace_user(&updated).await? {
        return Err(PlacementError::not_found("User not found"));
    }

    tracing::info!(
        user_id = %caller.user_id,
        fields = ?update.fields().collect::<Vec<_>>(),
        "profile updated"
    );

    Ok(HttpResponse::Ok().json(ProfileUpdateResponse {
        success: true,
        message: "Profile updated successfully".to_string(),
        user: UserView::from(&updated),
    }))
}
