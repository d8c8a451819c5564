use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use placement_core::{BlobId, PageRequest, PlacementError, User, UserFilter};

use crate::BlobStore;

/// Document-style persistence for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Duplicate ids or emails are validation errors.
    ///
    /// Registration is owned by another service; this exists for seeding and tests.
    async fn insert_user(&self, user: &User) -> Result<(), PlacementError>;

    async fn find_user(&self, id: &str) -> Result<Option<User>, PlacementError>;

    /// Overwrite a stored user. Returns `false` when no record matched.
    async fn replace_user(&self, user: &User) -> Result<bool, PlacementError>;

    /// Set or clear `profile.avatar` with a single-field write.
    /// Returns `false` when no record matched.
    async fn set_avatar(&self, id: &str, avatar: Option<&BlobId>) -> Result<bool, PlacementError>;

    /// Point a student at a counsellor. Fails with a validation error unless
    /// `counsellor_id` names a user whose role is counsellor.
    async fn assign_counsellor(
        &self,
        student_id: &str,
        counsellor_id: &str,
    ) -> Result<bool, PlacementError>;

    /// One page of users matching `filter`, in creation order.
    async fn find_users(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> Result<Vec<User>, PlacementError>;

    async fn count_users(&self, filter: &UserFilter) -> Result<u64, PlacementError>;

    /// Resolve display names for a batch of user ids. Unknown ids are omitted.
    async fn find_names(&self, ids: &[String]) -> Result<HashMap<String, String>, PlacementError>;
}

/// Trait implemented by all persistence backends.
///
/// A backend owns both the user record store and the blob store, plus the
/// connection lifecycle shared by the two.
#[async_trait]
pub trait Storage: UserStore + BlobStore {
    /// Initialize the backing store (e.g., bootstrap schema / create indexes).
    async fn init(&self) -> Result<(), PlacementError>;

    /// Lightweight liveness/readiness check.
    ///
    /// Implementations may override to do something cheaper than `init()`.
    async fn healthcheck(&self) -> Result<(), PlacementError> {
        self.init().await
    }

    /// Release connections. The handle must not be used afterwards.
    async fn shutdown(&self) -> Result<(), PlacementError> {
        Ok(())
    }
}

pub type DynStorage = Arc<dyn Storage>;
