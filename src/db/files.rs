//! Uploaded file storage. Bytes live in the database alongside their metadata.

use sqlx::sqlite::SqlitePool;

use super::EntityOwner;

#[derive(Clone)]
pub struct FileStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: i64,
    pub uuid: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub size: i64,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct StoredFileRow {
    id: i64,
    uuid: String,
    filename: String,
    content_type: String,
    data: Vec<u8>,
    size: i64,
    created_at: String,
}

impl From<StoredFileRow> for StoredFile {
    fn from(row: StoredFileRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            filename: row.filename,
            content_type: row.content_type,
            data: row.data,
            size: row.size,
            created_at: row.created_at,
        }
    }
}

impl FileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a file. Returns the file UUID.
    pub async fn create(
        &self,
        user_id: i64,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO files (uuid, user_id, filename, content_type, data, size)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(user_id)
        .bind(filename)
        .bind(content_type)
        .bind(data)
        .bind(data.len() as i64)
        .execute(&self.pool)
        .await?;

        Ok(uuid)
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<StoredFile>, sqlx::Error> {
        let row: Option<StoredFileRow> = sqlx::query_as(
            "SELECT id, uuid, filename, content_type, data, size, created_at
             FROM files WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StoredFile::from))
    }

    pub async fn delete(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM files WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn owner_of(&self, uuid: &str) -> Result<Option<EntityOwner>, sqlx::Error> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT u.uuid FROM files f LEFT JOIN users u ON u.id = f.user_id WHERE f.uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(owner,)| EntityOwner::from_column(owner)))
    }
}
