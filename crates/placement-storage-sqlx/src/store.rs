use async_trait::async_trait;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use sqlx::{Pool, Postgres, Sqlite};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;

use placement_core::{BlobId, NewBlob, PageRequest, PlacementError, Role, User, UserFilter};
use placement_ports::{BlobStore, ByteStream, Storage, UserStore};

/// Download chunk size, matching the GridFS default so both backends stream alike.
const CHUNK_SIZE: usize = 255 * 1024;

#[derive(Clone, Debug)]
enum DatabasePool {
    Sqlite(Pool<Sqlite>),
    Postgres(Pool<Postgres>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dialect {
    Sqlite,
    Postgres,
}

/// Hands out positional parameters in the syntax of the target database.
struct Placeholders {
    dialect: Dialect,
    next: usize,
}

impl Placeholders {
    fn new(dialect: Dialect) -> Self {
        Self { dialect, next: 1 }
    }

    fn next(&mut self) -> String {
        match self.dialect {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => {
                let p = format!("${}", self.next);
                self.next += 1;
                p
            }
        }
    }
}

/// `WHERE` clause (without the keyword) and its bind values for a listing filter.
fn filter_clause(filter: &UserFilter, ph: &mut Placeholders) -> (String, Vec<String>) {
    let mut clause = format!("role = {}", ph.next());
    let mut binds = vec![filter.role.as_str().to_string()];
    if let Some(counsellor) = &filter.counsellor {
        clause.push_str(&format!(" AND counsellor = {}", ph.next()));
        binds.push(counsellor.clone());
    }
    (clause, binds)
}

fn page_query(dialect: Dialect, filter: &UserFilter) -> (String, Vec<String>) {
    let mut ph = Placeholders::new(dialect);
    let (clause, binds) = filter_clause(filter, &mut ph);
    let sql = format!(
        "SELECT document FROM users WHERE {clause} ORDER BY created_at ASC, id ASC LIMIT {} OFFSET {}",
        ph.next(),
        ph.next()
    );
    (sql, binds)
}

fn count_query(dialect: Dialect, filter: &UserFilter) -> (String, Vec<String>) {
    let mut ph = Placeholders::new(dialect);
    let (clause, binds) = filter_clause(filter, &mut ph);
    (format!("SELECT COUNT(*) FROM users WHERE {clause}"), binds)
}

fn names_query(dialect: Dialect, count: usize) -> String {
    let mut ph = Placeholders::new(dialect);
    let params = (0..count).map(|_| ph.next()).collect::<Vec<_>>().join(", ");
    format!("SELECT id, name FROM users WHERE id IN ({params})")
}

fn sql_limit(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Column values mirrored out of the JSON document for filtering and uniqueness.
struct UserRow {
    id: String,
    email: String,
    name: String,
    role: &'static str,
    counsellor: Option<String>,
    created_at: String,
    document: String,
}

impl UserRow {
    fn from_user(user: &User) -> Result<Self, PlacementError> {
        Ok(Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.as_str(),
            counsellor: user.profile.counsellor.clone(),
            created_at: user.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            document: serde_json::to_string(user)?,
        })
    }
}

fn decode_user(document: &str) -> Result<User, PlacementError> {
    Ok(serde_json::from_str(document)?)
}

fn chunked(data: Vec<u8>) -> ByteStream {
    let bytes = Bytes::from(data);
    let chunks: Vec<Result<Bytes, PlacementError>> = (0..bytes.len())
        .step_by(CHUNK_SIZE)
        .map(|start| Ok(bytes.slice(start..(start + CHUNK_SIZE).min(bytes.len()))))
        .collect();
    futures::stream::iter(chunks).boxed()
}

/// SQL-backed storage implementation (SQLite/Postgres) using SQLx.
pub struct SqlxStorage {
    pool: DatabasePool,
    bucket: String,
}

impl SqlxStorage {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // SQLite files (and their directories) are created on first use.
        let pool = if database_url.starts_with("postgres") {
            DatabasePool::Postgres(Pool::<Postgres>::connect(database_url).await?)
        } else {
            // Failures here resurface as connect errors.
            if let Some(path) = sqlite_db_path(database_url) {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        let _ = std::fs::create_dir_all(parent);
                    }
                }

                if !path.as_os_str().is_empty() && !path.exists() {
                    let _ = std::fs::File::create(&path);
                }
            }

            let connect_url = sqlite_url_with_create_mode(database_url);
            DatabasePool::Sqlite(Pool::<Sqlite>::connect(connect_url.as_ref()).await?)
        };

        Ok(Self {
            pool,
            bucket: "avatars".to_string(),
        })
    }

    /// Namespace blobs under `bucket` (defaults to `avatars`).
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    fn dialect(&self) -> Dialect {
        match &self.pool {
            DatabasePool::Sqlite(_) => Dialect::Sqlite,
            DatabasePool::Postgres(_) => Dialect::Postgres,
        }
    }

    async fn init_sqlx(&self) -> Result<(), sqlx::Error> {
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                for statement in SQLITE_SCHEMA {
                    sqlx::query(statement).execute(pool).await?;
                }
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DatabasePool::Postgres(pool) => {
                for statement in POSTGRES_SCHEMA {
                    sqlx::query(statement).execute(pool).await?;
                }
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }

        Ok(())
    }

    /// Read-modify-write a user document inside one transaction.
    async fn modify_user<F>(&self, id: &str, modify: F) -> Result<bool, PlacementError>
    where
        F: FnOnce(&mut User) + Send,
    {
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                let document: Option<String> =
                    sqlx::query_scalar("SELECT document FROM users WHERE id = ?")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                let Some(document) = document else {
                    return Ok(false);
                };

                let mut user = decode_user(&document)?;
                modify(&mut user);
                user.updated_at = Utc::now();
                let row = UserRow::from_user(&user)?;

                sqlx::query("UPDATE users SET counsellor = ?, document = ? WHERE id = ?")
                    .bind(row.counsellor)
                    .bind(row.document)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
            }
            DatabasePool::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                let document: Option<String> =
                    sqlx::query_scalar("SELECT document FROM users WHERE id = $1 FOR UPDATE")
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                let Some(document) = document else {
                    return Ok(false);
                };

                let mut user = decode_user(&document)?;
                modify(&mut user);
                user.updated_at = Utc::now();
                let row = UserRow::from_user(&user)?;

                sqlx::query("UPDATE users SET counsellor = $1, document = $2 WHERE id = $3")
                    .bind(row.counsellor)
                    .bind(row.document)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
            }
        }

        Ok(true)
    }
}

const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        role TEXT NOT NULL,
        counsellor TEXT,
        created_at TEXT NOT NULL,
        document TEXT NOT NULL
    );
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_users_role_counsellor ON users(role, counsellor);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);"#,
    r#"
    CREATE TABLE IF NOT EXISTS blobs (
        id TEXT PRIMARY KEY,
        bucket TEXT NOT NULL,
        filename TEXT NOT NULL,
        content_type TEXT NOT NULL,
        length INTEGER NOT NULL,
        data BLOB NOT NULL,
        uploaded_at TEXT NOT NULL
    );
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_blobs_bucket ON blobs(bucket);"#,
];

const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        role TEXT NOT NULL,
        counsellor TEXT,
        created_at TEXT NOT NULL,
        document TEXT NOT NULL
    );
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_users_role_counsellor ON users(role, counsellor);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at);"#,
    r#"
    CREATE TABLE IF NOT EXISTS blobs (
        id TEXT PRIMARY KEY,
        bucket TEXT NOT NULL,
        filename TEXT NOT NULL,
        content_type TEXT NOT NULL,
        length BIGINT NOT NULL,
        data BYTEA NOT NULL,
        uploaded_at TEXT NOT NULL
    );
    "#,
    r#"CREATE INDEX IF NOT EXISTS idx_blobs_bucket ON blobs(bucket);"#,
];

#[async_trait]
impl UserStore for SqlxStorage {
    async fn insert_user(&self, user: &User) -> Result<(), PlacementError> {
        let row = UserRow::from_user(user)?;
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO users (id, email, name, role, counsellor, created_at, document)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(row.id)
                .bind(row.email)
                .bind(row.name)
                .bind(row.role)
                .bind(row.counsellor)
                .bind(row.created_at)
                .bind(row.document)
                .execute(pool)
                .await?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO users (id, email, name, role, counsellor, created_at, document)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(row.id)
                .bind(row.email)
                .bind(row.name)
                .bind(row.role)
                .bind(row.counsellor)
                .bind(row.created_at)
                .bind(row.document)
                .execute(pool)
                .await?;
            }
        }

        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, PlacementError> {
        let document: Option<String> = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query_scalar("SELECT document FROM users WHERE id = ?")
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query_scalar("SELECT document FROM users WHERE id = $1")
                    .bind(id)
                    .fetch_optional(pool)
                    .await?
            }
        };

        document.as_deref().map(decode_user).transpose()
    }

    async fn replace_user(&self, user: &User) -> Result<bool, PlacementError> {
        let row = UserRow::from_user(user)?;
        let result = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query(
                    r#"
                    UPDATE users SET email = ?, name = ?, role = ?, counsellor = ?, document = ?
                    WHERE id = ?
                    "#,
                )
                .bind(row.email)
                .bind(row.name)
                .bind(row.role)
                .bind(row.counsellor)
                .bind(row.document)
                .bind(row.id)
                .execute(pool)
                .await?
                .rows_affected()
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query(
                    r#"
                    UPDATE users SET email = $1, name = $2, role = $3, counsellor = $4, document = $5
                    WHERE id = $6
                    "#,
                )
                .bind(row.email)
                .bind(row.name)
                .bind(row.role)
                .bind(row.counsellor)
                .bind(row.document)
                .bind(row.id)
                .execute(pool)
                .await?
                .rows_affected()
            }
        };

        Ok(result > 0)
    }

    async fn set_avatar(&self, id: &str, avatar: Option<&BlobId>) -> Result<bool, PlacementError> {
        let avatar = avatar.cloned();
        self.modify_user(id, move |user| user.profile.avatar = avatar)
            .await
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

        let counsellor_id = counsellor_id.to_string();
        self.modify_user(student_id, move |user| {
            user.profile.counsellor = Some(counsellor_id)
        })
        .await
    }

    async fn find_users(
        &self,
        filter: &UserFilter,
        page: &PageRequest,
    ) -> Result<Vec<User>, PlacementError> {
        let (sql, binds) = page_query(self.dialect(), filter);
        let limit = sql_limit(page.limit);
        let offset = sql_limit(page.skip());

        let documents = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let mut query = sqlx::query_scalar::<Sqlite, String>(&sql);
                for value in binds {
                    query = query.bind(value);
                }
                query.bind(limit).bind(offset).fetch_all(pool).await?
            }
            DatabasePool::Postgres(pool) => {
                let mut query = sqlx::query_scalar::<Postgres, String>(&sql);
                for value in binds {
                    query = query.bind(value);
                }
                query.bind(limit).bind(offset).fetch_all(pool).await?
            }
        };

        documents.iter().map(|d| decode_user(d)).collect()
    }

    async fn count_users(&self, filter: &UserFilter) -> Result<u64, PlacementError> {
        let (sql, binds) = count_query(self.dialect(), filter);

        let count = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let mut query = sqlx::query_scalar::<Sqlite, i64>(&sql);
                for value in binds {
                    query = query.bind(value);
                }
                query.fetch_one(pool).await?
            }
            DatabasePool::Postgres(pool) => {
                let mut query = sqlx::query_scalar::<Postgres, i64>(&sql);
                for value in binds {
                    query = query.bind(value);
                }
                query.fetch_one(pool).await?
            }
        };

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn find_names(&self, ids: &[String]) -> Result<HashMap<String, String>, PlacementError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = names_query(self.dialect(), ids.len());
        let rows = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let mut query = sqlx::query_as::<Sqlite, (String, String)>(&sql);
                for id in ids {
                    query = query.bind(id.clone());
                }
                query.fetch_all(pool).await?
            }
            DatabasePool::Postgres(pool) => {
                let mut query = sqlx::query_as::<Postgres, (String, String)>(&sql);
                for id in ids {
                    query = query.bind(id.clone());
                }
                query.fetch_all(pool).await?
            }
        };

        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl BlobStore for SqlxStorage {
    async fn upload(&self, blob: &NewBlob) -> Result<BlobId, PlacementError> {
        let id = BlobId::generate();
        let length = i64::try_from(blob.len()).unwrap_or(i64::MAX);
        let uploaded_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO blobs (id, bucket, filename, content_type, length, data, uploaded_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id.as_str())
                .bind(&self.bucket)
                .bind(&blob.filename)
                .bind(&blob.content_type)
                .bind(length)
                .bind(&blob.data)
                .bind(&uploaded_at)
                .execute(pool)
                .await?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO blobs (id, bucket, filename, content_type, length, data, uploaded_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(id.as_str())
                .bind(&self.bucket)
                .bind(&blob.filename)
                .bind(&blob.content_type)
                .bind(length)
                .bind(&blob.data)
                .bind(&uploaded_at)
                .execute(pool)
                .await?;
            }
        }

        Ok(id)
    }

    async fn open_download(&self, id: &BlobId) -> Result<Option<ByteStream>, PlacementError> {
        let data: Option<Vec<u8>> = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query_scalar("SELECT data FROM blobs WHERE id = ? AND bucket = ?")
                    .bind(id.as_str())
                    .bind(&self.bucket)
                    .fetch_optional(pool)
                    .await?
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query_scalar("SELECT data FROM blobs WHERE id = $1 AND bucket = $2")
                    .bind(id.as_str())
                    .bind(&self.bucket)
                    .fetch_optional(pool)
                    .await?
            }
        };

        Ok(data.map(chunked))
    }

    async fn delete(&self, id: &BlobId) -> Result<bool, PlacementError> {
        let affected = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query("DELETE FROM blobs WHERE id = ? AND bucket = ?")
                    .bind(id.as_str())
                    .bind(&self.bucket)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query("DELETE FROM blobs WHERE id = $1 AND bucket = $2")
                    .bind(id.as_str())
                    .bind(&self.bucket)
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
        };

        Ok(affected > 0)
    }
}

#[async_trait]
impl Storage for SqlxStorage {
    async fn init(&self) -> Result<(), PlacementError> {
        self.init_sqlx().await.map_err(Into::into)
    }

    async fn healthcheck(&self) -> Result<(), PlacementError> {
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }

        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PlacementError> {
        match &self.pool {
            DatabasePool::Sqlite(pool) => pool.close().await,
            DatabasePool::Postgres(pool) => pool.close().await,
        }

        Ok(())
    }
}

fn sqlite_db_path(database_url: &str) -> Option<PathBuf> {
    if !database_url.starts_with("sqlite:") {
        return None;
    }
    if database_url.starts_with("sqlite::memory:") {
        return None;
    }

    let mut rest = &database_url["sqlite:".len()..];

    // `sqlite:///abs` and `sqlite://rel` both reduce to a single leading slash.
    if rest.starts_with("///") {
        rest = &rest[2..];
    } else if rest.starts_with("//") {
        rest = &rest[1..];
    }

    // Drop any query string.
    let path_part = rest.split('?').next().unwrap_or(rest);
    if path_part.is_empty() {
        return None;
    }

    Some(PathBuf::from(path_part))
}

fn sqlite_url_with_create_mode(database_url: &str) -> Cow<'_, str> {
    if !database_url.starts_with("sqlite:") {
        return Cow::Borrowed(database_url);
    }
    if database_url.starts_with("sqlite::memory:") {
        return Cow::Borrowed(database_url);
    }

    if database_url.contains("mode=") {
        return Cow::Borrowed(database_url);
    }

    let sep = if database_url.contains('?') { '&' } else { '?' };
    Cow::Owned(format!("{database_url}{sep}mode=rwc"))
}
