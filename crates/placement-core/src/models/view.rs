//! Response projections of stored users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use super::{PageRequest, Profile, Role, User};

/// Profile view returned by retrieval and update endpoints. Never carries binary content;
/// the avatar is only referenced by id.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile: Profile,
    pub is_placed: bool,
    pub placed_date: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            profile: user.profile.clone(),
            is_placed: user.is_placed,
            placed_date: user.placed_date,
        }
    }
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounsellorRef {
    pub id: String,
    pub name: String,
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub batch: Option<String>,
    pub phone: Option<String>,
    pub counsellor: Option<CounsellorRef>,
    pub is_placed: bool,
    pub placed_date: Option<DateTime<Utc>>,
}

impl StudentSummary {
    /// Project a student, resolving the counsellor id through `counsellor_names`.
    /// Dangling references resolve to `None`.
    pub fn project(user: &User, counsellor_names: &HashMap<String, String>) -> Self {
        let counsellor = user.profile.counsellor.as_ref().and_then(|id| {
            counsellor_names.get(id).map(|name| CounsellorRef {
                id: id.clone(),
                name: name.clone(),
            })
        });

        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            batch: user.profile.batch.clone(),
            phone: user.profile.phone.clone(),
            counsellor,
            is_placed: user.is_placed,
            placed_date: user.placed_date,
        }
    }
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounsellorSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&User> for CounsellorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.profile.phone.clone(),
        }
    }
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingMeta {
    pub total_students: u64,
    pub current_page: u64,
    pub total_pages: u64,
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counsellor: Option<CounsellorRef>,
}

impl ListingMeta {
    pub fn new(total: u64, page: &PageRequest) -> Self {
        Self {
            total_students: total,
            current_page: page.page,
            total_pages: page.total_pages(total),
            limit: page.limit,
            counsellor: None,
        }
    }

    pub fn with_counsellor(mut self, counsellor: CounsellorRef) -> Self {
        self.counsellor = Some(counsellor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_summary_resolves_counsellor_name() {
        let counsellor = User::new("Carol".into(), "carol@x.test".into(), Role::Counsellor);
        let student = User::new("Sam".into(), "sam@x.test".into(), Role::Student)
            .with_counsellor(counsellor.id.clone());

        let names = HashMap::from([(counsellor.id.clone(), counsellor.name.clone())]);
        let summary = StudentSummary::project(&student, &names);
        assert_eq!(
            summary.counsellor,
            Some(CounsellorRef {
                id: counsellor.id,
                name: "Carol".to_string()
            })
        );

        let dangling = StudentSummary::project(&student, &HashMap::new());
        assert_eq!(dangling.counsellor, None);
    }

    #[test]
    fn listing_meta_matches_wire_shape() {
        let page = PageRequest::new(1, 2).expect("valid");
        let meta = ListingMeta::new(3, &page);
        let json = serde_json::to_value(&meta).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "totalStudents": 3,
                "currentPage": 1,
                "totalPages": 2,
                "limit": 2
            })
        );
    }
}
