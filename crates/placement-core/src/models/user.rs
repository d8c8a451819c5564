use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use super::BlobId;

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Counsellor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Counsellor => "counsellor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Role::Student),
            "counsellor" => Some(Role::Counsellor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub portfolio: Option<String>,
}

#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub permanent_address: Option<String>,
    #[serde(default)]
    pub current_address: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    /// Id of the assigned counsellor (a user with role `counsellor`).
    #[serde(default)]
    pub counsellor: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub alternate_phone: Option<String>,
    #[serde(default)]
    pub social_links: SocialLinks,
    #[serde(default)]
    pub avatar: Option<BlobId>,
}

/// A user document as persisted in the user record store.
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub is_placed: bool,
    #[serde(default)]
    pub placed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub certificates: Vec<String>,
    #[serde(default)]
    pub resume: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            role,
            profile: Profile::default(),
            is_placed: false,
            placed_date: None,
            certificates: Vec::new(),
            resume: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_counsellor(mut self, counsellor_id: impl Into<String>) -> Self {
        self.profile.counsellor = Some(counsellor_id.into());
        self
    }

    pub fn avatar(&self) -> Option<&BlobId> {
        self.profile.avatar.as_ref()
    }
}

/// Equality filter used by the listing queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFilter {
    pub role: Role,
    pub counsellor: Option<String>,
}

impl UserFilter {
    pub fn role(role: Role) -> Self {
        Self {
            role,
            counsellor: None,
        }
    }

    pub fn with_counsellor(mut self, counsellor_id: impl Into<String>) -> Self {
        self.counsellor = Some(counsellor_id.into());
        self
    }

    pub fn matches(&self, user: &User) -> bool {
        user.role == self.role
            && self
                .counsellor
                .as_deref()
                .map_or(true, |c| user.profile.counsellor.as_deref() == Some(c))
    }
}
