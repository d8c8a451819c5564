use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use placement_actix::handlers::{avatar, health, listing, user};

/// Registers the `bearer` scheme referenced by the authenticated routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::new);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// The API document, served by the server under `/api-docs/openapi.json` and written to
/// disk by the `export_openapi` binary.
#[derive(OpenApi)]
#[openapi(
    paths(
        user::get_user,
        user::update_profile,
        avatar::upload_avatar,
        avatar::get_own_avatar,
        avatar::remove_avatar,
        avatar::get_user_avatar,
        listing::list_students,
        listing::list_my_students,
        listing::list_counsellors,
        health::health,
        health::readiness,
        health::system_metrics,
    ),
    modifiers(&BearerAuth),
    components(
        schemas(
            placement_core::Role,
            placement_core::Gender,
            placement_core::SocialLinks,
            placement_core::Profile,
            placement_core::BlobId,
            placement_core::UserView,
            placement_core::CounsellorRef,
            placement_core::StudentSummary,
            placement_core::CounsellorSummary,
            placement_core::ListingMeta,
            placement_core::UserResponse,
            placement_core::ProfileUpdateResponse,
            placement_core::AvatarUploadResponse,
            placement_core::MessageResponse,
            placement_core::StudentListing,
            placement_core::CounsellorListing,
            placement_core::PlacementError,
            avatar::AvatarForm,
        )
    ),
    tags(
        (name = "Users", description = "Profile retrieval and update"),
        (name = "Avatars", description = "Profile picture upload, download and removal"),
        (name = "Listings", description = "Paginated student and counsellor listings"),
        (name = "Observability", description = "Health checks and metrics"),
    ),
    info(
        title = "Placement Server API",
        version = "0.1.0",
        description = "Student placement management: profiles, avatars and role-scoped listings",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;
