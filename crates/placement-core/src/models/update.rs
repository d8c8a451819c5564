use chrono::Utc;
use serde_json::{Map, Value};

use super::{PlacementError, User};

/// Field paths a user may change on their own record.
///
/// Identity, role, counsellor assignment, avatar and placement status are managed
/// elsewhere and cannot be set here.
pub const UPDATABLE_FIELDS: &[&str] = &[
    "name",
    "certificates",
    "resume",
    "profile.gender",
    "profile.permanentAddress",
    "profile.currentAddress",
    "profile.birthDate",
    "profile.batch",
    "profile.phone",
    "profile.alternatePhone",
    "profile.socialLinks",
    "profile.socialLinks.linkedin",
    "profile.socialLinks.github",
    "profile.socialLinks.portfolio",
];

pub fn is_updatable(field: &str) -> bool {
    UPDATABLE_FIELDS.contains(&field)
}

/// A validated set of field changes, keyed by dotted path.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    changes: Map<String, Value>,
}

impl ProfileUpdate {
    /// Validate a flat `field -> value` mapping. A single disallowed key rejects the
    /// whole update.
    pub fn from_map(changes: Map<String, Value>) -> Result<Self, PlacementError> {
        if changes.is_empty() {
            return Err(PlacementError::validation("no fields to update"));
        }

        let rejected: Vec<&str> = changes
            .keys()
            .map(String::as_str)
            .filter(|k| !is_updatable(k))
            .collect();
        if !rejected.is_empty() {
            return Err(PlacementError::validation(format!(
                "fields not allowed: {}",
                rejected.join(", ")
            )));
        }

        if let Some(name) = changes.get("name") {
            if name.as_str().map_or(true, |n| n.trim().is_empty()) {
                return Err(PlacementError::validation("name must be a non-empty string"));
            }
        }

        Ok(Self { changes })
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// Produce the updated record. The input is left untouched, so a failure here means
    /// nothing was applied.
    pub fn apply(&self, user: &User) -> Result<User, PlacementError> {
        let mut doc = serde_json::to_value(user)?;
        for (path, value) in &self.changes {
            set_path(&mut doc, path, value.clone());
        }

        let mut updated: User = serde_json::from_value(doc)
            .map_err(|e| PlacementError::validation(format!("invalid field value: {e}")))?;
        updated.updated_at = Utc::now();
        Ok(updated)
    }
}

fn set_path(target: &mut Value, path: &str, value: Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    match path.split_once('.') {
        Some((head, rest)) => {
            let child = map.entry(head.to_string()).or_insert(Value::Null);
            set_path(child, rest, value);
        }
        None => {
            map.insert(path.to_string(), value);
        }
    }
}
