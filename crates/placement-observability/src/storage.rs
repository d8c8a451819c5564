use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{field, Instrument};

use placement_core::{BlobId, NewBlob, PageRequest, PlacementError, User, UserFilter};
use placement_ports::{BlobStore, ByteStream, DynStorage, Storage, UserStore};

use crate::telemetry::annotate_span_with_trace_ids;

/// A thin wrapper around a `DynStorage` that creates a tracing span for each storage call.
///
/// This lets request spans (created by actix middleware) extend naturally through
/// handlers down into persistence calls. Blob contents are never recorded.
pub struct ObservedStorage {
    inner: DynStorage,
    db_system: String,
}

impl ObservedStorage {
    pub fn new(inner: DynStorage, db_system: String) -> Self {
        Self { inner, db_system }
    }

    pub fn db_system(&self) -> &str {
        &self.db_system
    }

    fn span(&self, operation: &'static str) -> tracing::Span {
        let span = tracing::info_span!(
            "db",
            trace_id = field::Empty,
            span_id = field::Empty,
            db_system = %self.db_system,
            db_operation = operation
        );
        annotate_span_with_trace_ids(&span);
        span
    }

    fn user_span(&self, operation: &'static str, user_id: &str) -> tracing::Span {
        let span = tracing::info_span!(
            "db",
            trace_id = field::Empty,
            span_id = field::Empty,
            db_system = %self.db_system,
            db_operation = operation,
            user_id = %user_id
        );
        annotate_span_with_trace_ids(&span);
        span
    }

    fn blob_span(&self, operation: &'static str, blob_id: &BlobId) -> tracing::Span {
        let span = tracing::info_span!(
            "db",
            trace_id = field::Empty,
            span_id = field::Empty,
            db_system = %self.db_system,
            db_operation = operation,
            blob_id = %blob_id
        );
        annotate_span_with_trace_ids(&span);
        span
    }

    fn listing_span(&self, operation: &'static str, filter: &UserFilter) -> tracing::Span {
        let span = tracing::info_span!(
            "db",
            trace_id = field::Empty,
            span_id = field::Empty,
            db_system = %self.db_system,
            db_operation = operation,
            role = %filter.role,
            counsellor = %filter.counsellor.as_deref().unwrap_or(""),
            page = field::Empty,
            limit = field::Empty
        );
        annotate_span_with_trace_ids(&span);
        span
    }
}

#[async_trait]
impl UserStore for ObservedStorage {
    async fn insert_user(&self, user: &User) -> Result<(), PlacementError> {
        let span = self.user_span("insert_user", &user.id);
        async move { self.inner.insert_user(user).await }
            .instrument(span)
            .await
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, PlacementError> {
        let span = self.user_span("find_user", id);
        async move { self.inner.find_user(id).await }
            .instrument(span)
            .await
    }

    async fn replace_user(&self, user: &User) -> Result<bool, PlacementError> {
        let span = self.user_span("replace_user", &user.id);
        async move { self.inner.replace_user(user).await }
            .instrument(span)
            .await
    }

    async fn set_avatar(&self, id: &str, avatar: Option<&BlobId>) -> Result<bool, PlacementError> {
        let span = tracing::info_span!(
            "db",
            trace_id = field::Empty,
            span_id = field::Empty,
            db_system = %self.db_system,
            db_operation = "set_avatar",
            user_id = %id,
            blob_id = %avatar.map(BlobId::as_str).unwrap_or("")
        );
        annotate_span_with_trace_ids(&span);
        async move { self.inner.set_avatar(id, avatar).await }
            .instrument(span)
            .await
    }

    async fn assign_counsellor(
        &self,
        student_id: &str,
        counsellor_id: &str,
    ) -> Result<bool, PlacementError> {
        let span = tracing::info_span!(
            "db",
            trace_id = field::Empty,
            span_id = field::Empty,
            db_system = %self.db_system,
            db_operation = "assign_counsellor",
            user_id = %student_id,
            counsellor = %counsellor_id
        );
        annotate_span_with_trace_ids(&span);
        async move {
            self.inner
                .assign_counsellor(student_id, counsellor_id)
                .await
        }
        .instrument(span)
        .await
    }

    async fn find_users(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> Result<Vec<User>, PlacementError> {
        let span = self.listing_span("find_users", filter);
        span.record("page", page.page);
        span.record("limit", page.limit);
        async move { self.inner.find_users(filter, page).await }
            .instrument(span)
            .await
    }

    async fn count_users(&self, filter: &UserFilter) -> Result<u64, PlacementError> {
        let span = self.listing_span("count_users", filter);
        async move { self.inner.count_users(filter).await }
            .instrument(span)
            .await
    }

    async fn find_names(&self, ids: &[String]) -> Result<HashMap<String, String>, PlacementError> {
        let span = tracing::info_span!(
            "db",
            trace_id = field::Empty,
            span_id = field::Empty,
            db_system = %self.db_system,
            db_operation = "find_names",
            id_count = ids.len()
        );
        annotate_span_with_trace_ids(&span);
        async move { self.inner.find_names(ids).await }
            .instrument(span)
            .await
    }
}

#[async_trait]
impl BlobStore for ObservedStorage {
    async fn upload(&self, blob: &NewBlob) -> Result<BlobId, PlacementError> {
        let span = tracing::info_span!(
            "db",
            trace_id = field::Empty,
            span_id = field::Empty,
            db_system = %self.db_system,
            db_operation = "blob_upload",
            filename = %blob.filename,
            content_type = %blob.content_type,
            size_bytes = blob.len()
        );
        annotate_span_with_trace_ids(&span);
        async move { self.inner.upload(blob).await }
            .instrument(span)
            .await
    }

    async fn open_download(&self, id: &BlobId) -> Result<Option<ByteStream>, PlacementError> {
        let span = self.blob_span("blob_open_download", id);
        async move { self.inner.open_download(id).await }
            .instrument(span)
            .await
    }

    async fn delete(&self, id: &BlobId) -> Result<bool, PlacementError> {
        let span = self.blob_span("blob_delete", id);
        async move { self.inner.delete(id).await }
            .instrument(span)
            .await
    }
}

#[async_trait]
impl Storage for ObservedStorage {
    async fn init(&self) -> Result<(), PlacementError> {
        let span = self.span("init");
        async move { self.inner.init().await }
            .instrument(span)
            .await
    }

    async fn healthcheck(&self) -> Result<(), PlacementError> {
        let span = self.span("healthcheck");
        async move { self.inner.healthcheck().await }
            .instrument(span)
            .await
    }

    async fn shutdown(&self) -> Result<(), PlacementError> {
        let span = self.span("shutdown");
        async move { self.inner.shutdown().await }
            .instrument(span)
            .await
    }
}
