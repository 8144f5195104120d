//! Post storage.

use sqlx::sqlite::SqlitePool;

use super::EntityOwner;

#[derive(Clone)]
pub struct PostStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub uuid: String,
    /// UUID of the author, `None` for ownerless posts
    pub sender: Option<String>,
    pub title: String,
    pub content: String,
    pub likes: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    uuid: String,
    sender: Option<String>,
    title: String,
    content: String,
    likes: i64,
    created_at: String,
    updated_at: String,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            sender: row.sender,
            title: row.title,
            content: row.content,
            likes: row.likes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a post. `user_id` is `None` only for imported ownerless posts.
    pub async fn create(
        &self,
        user_id: Option<i64>,
        title: &str,
        content: &str,
    ) -> Result<Post, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO posts (uuid, user_id, title, content) VALUES (?, ?, ?, ?)")
            .bind(&uuid)
            .bind(user_id)
            .bind(title)
            .bind(content)
            .execute(&self.pool)
            .await?;

        self.get_by_uuid(&uuid)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Post>, sqlx::Error> {
        let row: Option<PostRow> = sqlx::query_as(
            "SELECT p.id, p.uuid, u.uuid AS sender, p.title, p.content,
                    (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS likes,
                    p.created_at, p.updated_at
             FROM posts p LEFT JOIN users u ON u.id = p.user_id
             WHERE p.uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Post::from))
    }

    /// List posts, newest first. `sender` filters by author UUID.
    pub async fn list(&self, sender: Option<&str>) -> Result<Vec<Post>, sqlx::Error> {
        let rows: Vec<PostRow> = sqlx::query_as(
            "SELECT p.id, p.uuid, u.uuid AS sender, p.title, p.content,
                    (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS likes,
                    p.created_at, p.updated_at
             FROM posts p LEFT JOIN users u ON u.id = p.user_id
             WHERE ? IS NULL OR u.uuid = ?
             ORDER BY p.id DESC",
        )
        .bind(sender)
        .bind(sender)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Update title and/or content. Returns true if the post exists.
    pub async fn update(
        &self,
        uuid: &str,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE posts SET
                title = COALESCE(?, title),
                content = COALESCE(?, content),
                updated_at = datetime('now')
             WHERE uuid = ?",
        )
        .bind(title)
        .bind(content)
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM posts WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn owner_of(&self, uuid: &str) -> Result<Option<EntityOwner>, sqlx::Error> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT u.uuid FROM posts p LEFT JOIN users u ON u.id = p.user_id WHERE p.uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(owner,)| EntityOwner::from_column(owner)))
    }
}
