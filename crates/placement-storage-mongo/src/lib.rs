use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{AsyncReadExt, StreamExt, TryStreamExt};
use mongodb::{
    bson::{self, doc, oid::ObjectId, Bson, Document},
    error::{ErrorKind, GridFsErrorKind},
    gridfs::GridFsBucket,
    options::{ClientOptions, FindOptions, GridFsBucketOptions, GridFsUploadOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use std::collections::HashMap;

use placement_core::{BlobId, NewBlob, PageRequest, PlacementError, Role, User, UserFilter};
use placement_ports::{BlobStore, ByteStream, Storage, UserStore};

const READ_CHUNK_SIZE: usize = 255 * 1024;

/// User fields stored as BSON dates rather than RFC 3339 strings.
const DATE_FIELDS: [&str; 3] = ["createdAt", "updatedAt", "placedDate"];

/// MongoDB-backed storage implementation.
///
/// Notes:
/// - Users are stored as documents via `serde`, keyed by `_id`. Timestamps are BSON
///   dates (millisecond precision) so `createdAt` sorts chronologically.
/// - Avatars live in a GridFS bucket (`avatars` unless configured otherwise).
/// - `email` is unique; listings are served by a `(role, profile.counsellor)` index.
pub struct MongoStorage {
    client: MongoClient,
    db: Database,
    users: Collection<Document>,
    bucket: GridFsBucket,
}

impl MongoStorage {
    pub async fn new(uri: &str) -> Result<Self, PlacementError> {
        Self::with_bucket(uri, "avatars").await
    }

    pub async fn with_bucket(uri: &str, bucket_name: &str) -> Result<Self, PlacementError> {
        let mut opts = ClientOptions::parse(uri)
            .await
            .map_err(Self::mongo_err_to_placement)?;
        if opts.app_name.is_none() {
            opts.app_name = Some("placement-storage-mongo".to_string());
        }

        let client = MongoClient::with_options(opts).map_err(Self::mongo_err_to_placement)?;

        // If URI doesn't specify a database, fall back to "placement".
        let db_name = client
            .default_database()
            .map(|d| d.name().to_string())
            .unwrap_or_else(|| "placement".to_string());

        let db = client.database(&db_name);

        let users = db.collection::<Document>("users");
        let bucket = db.gridfs_bucket(
            GridFsBucketOptions::builder()
                .bucket_name(bucket_name.to_string())
                .build(),
        );

        Ok(Self {
            client,
            db,
            users,
            bucket,
        })
    }

    async fn ensure_indexes(&self) -> Result<(), PlacementError> {
        // users.email unique
        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await
            .map_err(Self::mongo_err_to_placement)?;

        // listing filters
        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "role": 1, "profile.counsellor": 1, "createdAt": 1 })
                    .build(),
                None,
            )
            .await
            .map_err(Self::mongo_err_to_placement)?;

        Ok(())
    }

    fn duplicate_key_error(err: &mongodb::error::Error) -> bool {
        // Canonical server-side message includes "E11000".
        err.to_string().contains("E11000")
    }

    fn file_not_found(err: &mongodb::error::Error) -> bool {
        matches!(
            err.kind.as_ref(),
            ErrorKind::GridFs { 0: GridFsErrorKind::FileNotFound { .. }, .. }
        )
    }

    fn mongo_err_to_placement(err: mongodb::error::Error) -> PlacementError {
        if Self::duplicate_key_error(&err) {
            return PlacementError::validation("duplicate key");
        }

        PlacementError::internal(err)
    }

    fn filter_document(filter: &UserFilter) -> Document {
        let mut query = doc! { "role": filter.role.as_str() };
        if let Some(counsellor) = &filter.counsellor {
            query.insert("profile.counsellor", counsellor.as_str());
        }
        query
    }

    /// Stored ids that are not ObjectIds cannot name a GridFS file.
    fn object_id(id: &BlobId) -> Option<ObjectId> {
        ObjectId::parse_str(id.as_str()).ok()
    }

    fn date(at: DateTime<Utc>) -> Bson {
        Bson::DateTime(bson::DateTime::from_millis(at.timestamp_millis()))
    }

    fn now() -> Bson {
        Self::date(Utc::now())
    }

    fn to_record(user: &User) -> Result<Document, PlacementError> {
        let mut record = bson::to_document(user).map_err(PlacementError::internal)?;
        record.insert("createdAt", Self::date(user.created_at));
        record.insert("updatedAt", Self::date(user.updated_at));
        if let Some(placed) = user.placed_date {
            record.insert("placedDate", Self::date(placed));
        }
        Ok(record)
    }

    fn from_record(mut record: Document) -> Result<User, PlacementError> {
        for field in DATE_FIELDS {
            let text = match record.get(field) {
                Some(Bson::DateTime(at)) => at
                    .try_to_rfc3339_string()
                    .map_err(PlacementError::internal)?,
                _ => continue,
            };
            record.insert(field, text);
        }
        bson::from_document(record).map_err(PlacementError::internal)
    }
}

#[async_trait]
impl UserStore for MongoStorage {
    async fn insert_user(&self, user: &User) -> Result<(), PlacementError> {
        self.users
            .insert_one(Self::to_record(user)?, None)
            .await
            .map(|_| ())
            .map_err(Self::mongo_err_to_placement)
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, PlacementError> {
        self.users
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(Self::mongo_err_to_placement)?
            .map(Self::from_record)
            .transpose()
    }

    async fn replace_user(&self, user: &User) -> Result<bool, PlacementError> {
        self.users
            .replace_one(doc! { "_id": user.id.as_str() }, Self::to_record(user)?, None)
            .await
            .map(|r| r.matched_count > 0)
            .map_err(Self::mongo_err_to_placement)
    }

    async fn set_avatar(&self, id: &str, avatar: Option<&BlobId>) -> Result<bool, PlacementError> {
        let avatar = avatar.map_or(Bson::Null, |a| Bson::String(a.as_str().to_string()));
        self.users
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "profile.avatar": avatar, "updatedAt": Self::now() } },
                None,
            )
            .await
            .map(|r| r.matched_count > 0)
            .map_err(Self::mongo_err_to_placement)
    }

    async fn assign_counsellor(
        &self,
        student_id: &str,
        counsellor_id: &str,
    ) -> Result<bool, PlacementError> {
        match self.find_user(counsellor_id).await? {
            Some(counsellor) if counsellor.role == Role::Counsellor => {}
            _ => {
                return Err(PlacementError::validation(
                    "counsellor must reference an existing counsellor",
                ))
            }
        }

        self.users
            .update_one(
                doc! { "_id": student_id },
                doc! { "$set": { "profile.counsellor": counsellor_id, "updatedAt": Self::now() } },
                None,
            )
            .await
            .map(|r| r.matched_count > 0)
            .map_err(Self::mongo_err_to_placement)
    }

    async fn find_users(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> Result<Vec<User>, PlacementError> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": 1, "_id": 1 })
            .skip(page.skip())
            .limit(i64::try_from(page.limit).unwrap_or(i64::MAX))
            .build();

        let records: Vec<Document> = self
            .users
            .find(Self::filter_document(filter), options)
            .await
            .map_err(Self::mongo_err_to_placement)?
            .try_collect()
            .await
            .map_err(Self::mongo_err_to_placement)?;

        records.into_iter().map(Self::from_record).collect()
    }

    async fn count_users(&self, filter: &UserFilter) -> Result<u64, PlacementError> {
        self.users
            .count_documents(Self::filter_document(filter), None)
            .await
            .map_err(Self::mongo_err_to_placement)
    }

    async fn find_names(&self, ids: &[String]) -> Result<HashMap<String, String>, PlacementError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let options = FindOptions::builder()
            .projection(doc! { "name": 1 })
            .build();
        let docs: Vec<Document> = self
            .users
            .find(doc! { "_id": { "$in": ids.to_vec() } }, options)
            .await
            .map_err(Self::mongo_err_to_placement)?
            .try_collect()
            .await
            .map_err(Self::mongo_err_to_placement)?;

        Ok(docs
            .iter()
            .filter_map(|d| {
                let id = d.get_str("_id").ok()?;
                let name = d.get_str("name").ok()?;
                Some((id.to_string(), name.to_string()))
            })
            .collect())
    }
}

#[async_trait]
impl BlobStore for MongoStorage {
    async fn upload(&self, blob: &NewBlob) -> Result<BlobId, PlacementError> {
        let options = GridFsUploadOptions::builder()
            .metadata(doc! { "contentType": blob.content_type.as_str() })
            .build();

        let oid = self
            .bucket
            .upload_from_futures_0_3_reader(&blob.filename, blob.data.as_slice(), options)
            .await
            .map_err(Self::mongo_err_to_placement)?;

        Ok(BlobId::from_stored(oid.to_hex()))
    }

    async fn open_download(&self, id: &BlobId) -> Result<Option<ByteStream>, PlacementError> {
        let Some(oid) = Self::object_id(id) else {
            return Ok(None);
        };

        let reader = match self.bucket.open_download_stream(Bson::ObjectId(oid)).await {
            Ok(reader) => reader,
            Err(err) if Self::file_not_found(&err) => return Ok(None),
            Err(err) => return Err(Self::mongo_err_to_placement(err)),
        };

        let stream = futures::stream::try_unfold(reader, |mut reader| async move {
            let mut buf = vec![0u8; READ_CHUNK_SIZE];
            let n = reader.read(&mut buf).await.map_err(PlacementError::internal)?;
            if n == 0 {
                return Ok(None);
            }
            buf.truncate(n);
            Ok(Some((Bytes::from(buf), reader)))
        });

        Ok(Some(stream.boxed()))
    }

    async fn delete(&self, id: &BlobId) -> Result<bool, PlacementError> {
        let Some(oid) = Self::object_id(id) else {
            return Ok(false);
        };

        match self.bucket.delete(Bson::ObjectId(oid)).await {
            Ok(()) => Ok(true),
            Err(err) if Self::file_not_found(&err) => Ok(false),
            Err(err) => Err(Self::mongo_err_to_placement(err)),
        }
    }
}

#[async_trait]
impl Storage for MongoStorage {
    async fn init(&self) -> Result<(), PlacementError> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(Self::mongo_err_to_placement)?;
        self.ensure_indexes().await
    }

    async fn healthcheck(&self) -> Result<(), PlacementError> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(Self::mongo_err_to_placement)
    }

    async fn shutdown(&self) -> Result<(), PlacementError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn user_documents_are_keyed_by_id() {
        let user = User::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            Role::Student,
        )
        .with_counsellor("c-1");

        let doc = MongoStorage::to_record(&user).expect("user should serialize to bson document");
        assert_eq!(doc.get_str("_id").expect("_id"), user.id);
        assert_eq!(doc.get_str("role").expect("role"), "student");

        let profile = doc.get_document("profile").expect("profile");
        assert_eq!(profile.get_str("counsellor").expect("counsellor"), "c-1");
    }

    #[test]
    fn timestamps_are_stored_as_dates_and_read_back() {
        let mut user = User::new(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            Role::Student,
        );
        let whole = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("timestamp");
        user.created_at = whole;
        user.updated_at = whole + Duration::milliseconds(500);

        let record = MongoStorage::to_record(&user).expect("record");
        let created = record.get_datetime("createdAt").expect("createdAt is a date");
        let updated = record.get_datetime("updatedAt").expect("updatedAt is a date");
        assert!(created < updated);
        assert!(matches!(record.get("placedDate"), None | Some(Bson::Null)));

        let back = MongoStorage::from_record(record).expect("user");
        assert_eq!(back.created_at, user.created_at);
        assert_eq!(back.updated_at, user.updated_at);
    }

    #[test]
    fn listing_filter_only_constrains_counsellor_when_set() {
        let all = MongoStorage::filter_document(&UserFilter::role(Role::Student));
        assert_eq!(all, doc! { "role": "student" });

        let scoped =
            MongoStorage::filter_document(&UserFilter::role(Role::Student).with_counsellor("c-9"));
        assert_eq!(
            scoped,
            doc! { "role": "student", "profile.counsellor": "c-9" }
        );
    }

    #[test]
    fn malformed_blob_ids_are_not_object_ids() {
        assert!(MongoStorage::object_id(&BlobId::from_stored("not-an-oid")).is_none());
        let oid = ObjectId::new();
        assert_eq!(
            MongoStorage::object_id(&BlobId::from_stored(oid.to_hex())),
            Some(oid)
        );
    }
}
