use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;

use placement_core::{AvatarUploadResponse, BlobId, MessageResponse, NewBlob, PlacementError};
use placement_observability::Metrics;
use placement_ports::{BlobStore, DynStorage, UserStore};

use crate::middleware::Caller;
use crate::settings::AppSettings;

/// Multipart field carrying the image.
pub const AVATAR_FIELD: &str = "avatar";

/// Multipart body accepted by the upload endpoint.
#[cfg(feature = "openapi")]
#[derive(utoipa::ToSchema)]
pub struct AvatarForm {
    /// Image file; any `image/*` content type.
    #[schema(value_type = String, format = Binary)]
    pub avatar: Vec<u8>,
}

const SELF_CONTENT_TYPE: &str = "image/jpeg";
const ADMIN_CONTENT_TYPE: &str = "application/octet-stream";

fn multipart_error(err: actix_multipart::MultipartError) -> PlacementError {
    PlacementError::validation(format!("invalid multipart body: {err}"))
}

/// Pull the `avatar` field out of a multipart body, enforcing type and size limits.
///
/// Returns `None` when the body has no such field.
async fn read_avatar_field(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<Option<NewBlob>, PlacementError> {
    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }

        let content_type = match field.content_type() {
            Some(mime) if mime.type_().as_str() == "image" => mime.essence_str().to_string(),
            _ => return Err(PlacementError::validation("avatar must be an image")),
        };
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or(AVATAR_FIELD)
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
            if data.len() + chunk.len() > max_bytes {
                return Err(PlacementError::validation(format!(
                    "avatar exceeds the maximum size of {max_bytes} bytes"
                )));
            }
            data.extend_from_slice(&chunk);
        }

        if data.is_empty() {
            return Err(PlacementError::validation("avatar file is empty"));
        }

        return Ok(Some(NewBlob::new(filename, content_type, data)));
    }

    Ok(None)
}

/// Store a new avatar for the caller and point `profile.avatar` at it.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/user/avatar",
    tag = "Avatars",
    request_body(content = AvatarForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Avatar stored", body = AvatarUploadResponse),
        (status = 400, description = "Missing, empty, oversized or non-image file", body = PlacementError),
        (status = 401, description = "Missing or invalid token", body = PlacementError),
        (status = 404, description = "Caller has no user record", body = PlacementError)
    ),
    security(("bearer" = []))
))]
pub async fn upload_avatar(
    caller: Caller,
    payload: Multipart,
    db: web::Data<DynStorage>,
    settings: web::Data<AppSettings>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, PlacementError> {
    let blob = read_avatar_field(payload, settings.avatar_max_bytes)
        .await?
        .ok_or_else(|| PlacementError::validation("avatar file is required"))?;

    let user = db
        .find_user(&caller.user_id)
        .await?
        .ok_or_else(|| PlacementError::not_found("User not found"))?;
    let previous = user.avatar().cloned();

    let file_id = db.upload(&blob).await?;

    match db.set_avatar(&caller.user_id, Some(&file_id)).await {
        Ok(true) => {}
        Ok(false) => {
            discard_blob(&db, &file_id, "user vanished during upload").await;
            return Err(PlacementError::not_found("User not found"));
        }
        Err(err) => {
            discard_blob(&db, &file_id, "avatar reference not persisted").await;
            return Err(err);
        }
    }

    metrics.record_avatar_upload(blob.len());
    tracing::info!(
        user_id = %caller.user_id,
        blob_id = %file_id,
        size_bytes = blob.len(),
        "avatar uploaded"
    );

    if let Some(previous) = previous.filter(|p| *p != file_id) {
        discard_blob(&db, &previous, "replaced avatar").await;
    }

    Ok(HttpResponse::Ok().json(AvatarUploadResponse {
        success: true,
        message: "Avatar uploaded successfully".to_string(),
        file_id: file_id.to_string(),
    }))
}

/// Best-effort delete; failures are logged only.
async fn discard_blob(db: &DynStorage, id: &BlobId, reason: &'static str) {
    if !id.is_well_formed() {
        return;
    }
    if let Err(err) = db.delete(id).await {
        tracing::warn!(blob_id = %id, reason, error = %err, "failed to delete avatar blob");
    }
}

async fn stream_avatar(
    db: &DynStorage,
    metrics: &Metrics,
    user_id: &str,
    content_type: &'static str,
    variant: &'static str,
) -> Result<HttpResponse, PlacementError> {
    let user = db
        .find_user(user_id)
        .await?
        .ok_or_else(|| PlacementError::not_found("User not found"))?;

    let avatar = user
        .avatar()
        .ok_or_else(|| PlacementError::not_found("Avatar not found"))?;
    if !avatar.is_well_formed() {
        return Err(PlacementError::validation("invalid file id"));
    }

    let stream = db
        .open_download(avatar)
        .await?
        .ok_or_else(|| PlacementError::not_found("Avatar not found"))?;

    metrics.record_avatar_download(variant);

    // Headers are already on the wire once the body starts; a failing chunk can only
    // end the response early.
    let blob_id = avatar.to_string();
    let body = stream.inspect_err(move |err| {
        tracing::error!(blob_id = %blob_id, error = %err, "avatar stream aborted");
    });

    Ok(HttpResponse::Ok().content_type(content_type).streaming(body))
}

/// Stream the caller's own avatar.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/user/avatar",
    tag = "Avatars",
    responses(
        (status = 200, description = "Avatar bytes, served as image/jpeg"),
        (status = 400, description = "Stored avatar reference is malformed", body = PlacementError),
        (status = 404, description = "No user, no avatar or missing blob", body = PlacementError)
    ),
    security(("bearer" = []))
))]
pub async fn get_own_avatar(
    caller: Caller,
    db: web::Data<DynStorage>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, PlacementError> {
    stream_avatar(&db, &metrics, &caller.user_id, SELF_CONTENT_TYPE, "self").await
}

/// Stream any user's avatar (admin only).
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/admin/avatar/{id}",
    tag = "Avatars",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Avatar bytes, served as application/octet-stream"),
        (status = 403, description = "Caller is not an admin", body = PlacementError),
        (status = 404, description = "No user, no avatar or missing blob", body = PlacementError)
    ),
    security(("bearer" = []))
))]
pub async fn get_user_avatar(
    id: web::Path<String>,
    db: web::Data<DynStorage>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, PlacementError> {
    stream_avatar(&db, &metrics, &id, ADMIN_CONTENT_TYPE, "admin").await
}

/// Delete the caller's avatar blob, then clear the reference.
///
/// The reference is only cleared once the blob delete has succeeded (or found nothing to
/// delete), so a failed delete leaves the record pointing at a still-existing blob.
#[cfg_attr(feature = "openapi", utoipa::path(
    delete,
    path = "/user/avatar",
    tag = "Avatars",
    responses(
        (status = 200, description = "Avatar removed", body = MessageResponse),
        (status = 400, description = "Stored avatar reference is malformed", body = PlacementError),
        (status = 404, description = "No user or no avatar", body = PlacementError),
        (status = 500, description = "Blob delete failed; reference left in place", body = PlacementError)
    ),
    security(("bearer" = []))
))]
pub async fn remove_avatar(
    caller: Caller,
    db: web::Data<DynStorage>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, PlacementError> {
    let user = db
        .find_user(&caller.user_id)
        .await?
        .ok_or_else(|| PlacementError::not_found("User not found"))?;

    let avatar = user
        .avatar()
        .ok_or_else(|| PlacementError::not_found("Avatar not found"))?;
    if !avatar.is_well_formed() {
        return Err(PlacementError::validation("invalid file id"));
    }

    if !db.delete(avatar).await? {
        tracing::info!(blob_id = %avatar, "avatar blob already gone; clearing reference");
    }

    if !db.set_avatar(&caller.user_id, None).await? {
        return Err(PlacementError::not_found("User not found"));
    }

    metrics.avatar_removals_total.inc();
    tracing::info!(user_id = %caller.user_id, blob_id = %avatar, "avatar removed");

    Ok(HttpResponse::Ok().json(MessageResponse::new("Avatar removed successfully")))
}
