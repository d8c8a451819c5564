use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::collections::HashMap;

use placement_core::{
    CounsellorListing, CounsellorRef, CounsellorSummary, ListingMeta, PageRequest, PlacementError,
    Role, StudentListing, StudentSummary, User, UserFilter,
};
use placement_ports::{DynStorage, UserStore};

use crate::middleware::Caller;
use crate::settings::AppSettings;

/// Raw pagination parameters. Kept as strings so bad values become one uniform error.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    fn resolve(&self, settings: &AppSettings) -> Result<PageRequest, PlacementError> {
        PageRequest::from_query(
            self.page.as_deref(),
            self.limit.as_deref(),
            settings.default_page_size,
        )
    }
}

async fn counsellor_names(
    db: &DynStorage,
    students: &[User],
) -> Result<HashMap<String, String>, PlacementError> {
    let mut ids: Vec<String> = students
        .iter()
        .filter_map(|s| s.profile.counsellor.clone())
        .collect();
    ids.sort();
    ids.dedup();

    db.find_names(&ids).await
}

async fn student_page(
    db: &DynStorage,
    settings: &AppSettings,
    filter: &UserFilter,
    page: &PageRequest,
) -> Result<(Vec<StudentSummary>, ListingMeta), PlacementError> {
    let students = db.find_users(filter, page).await?;

    if students.is_empty() && settings.empty_page_is_not_found {
        return Err(PlacementError::not_found("No students found"));
    }

    let total = db.count_users(filter).await?;
    let names = counsellor_names(db, &students).await?;
    let data = students
        .iter()
        .map(|s| StudentSummary::project(s, &names))
        .collect();

    Ok((data, ListingMeta::new(total, page)))
}

/// Paginated list of every student (admin only).
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/admin/students",
    tag = "Listings",
    params(
        ("page" = Option<u64>, Query, description = "One-based page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default from configuration)")
    ),
    responses(
        (status = 200, description = "One page of students", body = StudentListing),
        (status = 400, description = "Malformed page or limit", body = PlacementError),
        (status = 403, description = "Caller is not an admin", body = PlacementError),
        (status = 404, description = "Page holds no students", body = PlacementError)
    ),
    security(("bearer" = []))
))]
pub async fn list_students(
    query: web::Query<PageQuery>,
    db: web::Data<DynStorage>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, PlacementError> {
    let page = query.resolve(&settings)?;
    let filter = UserFilter::role(Role::Student);

    let (data, meta) = student_page(&db, &settings, &filter, &page).await?;

    Ok(HttpResponse::Ok().json(StudentListing {
        success: true,
        data,
        meta,
    }))
}

/// Paginated list of the students assigned to the calling counsellor.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/counsellor/students",
    tag = "Listings",
    params(
        ("page" = Option<u64>, Query, description = "One-based page number (default 1)"),
        ("limit" = Option<u64>, Query, description = "Page size (default from configuration)")
    ),
    responses(
        (status = 200, description = "One page of the caller's students", body = StudentListing),
        (status = 400, description = "Malformed page or limit", body = PlacementError),
        (status = 403, description = "Caller is not a counsellor", body = PlacementError),
        (status = 404, description = "Page holds no students", body = PlacementError)
    ),
    security(("bearer" = []))
))]
pub async fn list_my_students(
    caller: Caller,
    query: web::Query<PageQuery>,
    db: web::Data<DynStorage>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, PlacementError> {
    let page = query.resolve(&settings)?;
    let filter = UserFilter::role(Role::Student).with_counsellor(caller.user_id.clone());

    let (data, meta) = student_page(&db, &settings, &filter, &page).await?;

    let name = db
        .find_user(&caller.user_id)
        .await?
        .map(|u| u.name)
        .unwrap_or_default();
    let meta = meta.with_counsellor(CounsellorRef {
        id: caller.user_id,
        name,
    });

    Ok(HttpResponse::Ok().json(StudentListing {
        success: true,
        data,
        meta,
    }))
}

/// Unpaginated list of every counsellor (admin only).
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/admin/counsellors",
    tag = "Listings",
    responses(
        (status = 200, description = "Every counsellor", body = CounsellorListing),
        (status = 403, description = "Caller is not an admin", body = PlacementError),
        (status = 404, description = "No counsellors exist", body = PlacementError)
    ),
    security(("bearer" = []))
))]
pub async fn list_counsellors(
    db: web::Data<DynStorage>,
    settings: web::Data<AppSettings>,
) -> Result<HttpResponse, PlacementError> {
    let filter = UserFilter::role(Role::Counsellor);
    let total = db.count_users(&filter).await?;
    if total == 0 && settings.empty_page_is_not_found {
        return Err(PlacementError::not_found("No counsellors found"));
    }

    let all = PageRequest::new(1, total.max(1))?;
    let counsellors = db.find_users(&filter, &all).await?;

    Ok(HttpResponse::Ok().json(CounsellorListing {
        success: true,
        data: counsellors.iter().map(CounsellorSummary::from).collect(),
    }))
}
