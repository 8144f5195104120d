//! Comment storage. Comments belong to a post and die with it.

use sqlx::sqlite::SqlitePool;

use super::EntityOwner;

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub uuid: String,
    pub post_uuid: String,
    /// UUID of the author, `None` for ownerless comments
    pub sender: Option<String>,
    pub message: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    uuid: String,
    post_uuid: String,
    sender: Option<String>,
    message: String,
    created_at: String,
    updated_at: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            post_uuid: row.post_uuid,
            sender: row.sender,
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        post_id: i64,
        user_id: Option<i64>,
        message: &str,
    ) -> Result<Comment, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO comments (uuid, post_id, user_id, message) VALUES (?, ?, ?, ?)")
            .bind(&uuid)
            .bind(post_id)
            .bind(user_id)
            .bind(message)
            .execute(&self.pool)
            .await?;

        self.get_by_uuid(&uuid)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Comment>, sqlx::Error> {
        let row: Option<CommentRow> = sqlx::query_as(
            "SELECT c.id, c.uuid, p.uuid AS post_uuid, u.uuid AS sender, c.message,
                    c.created_at, c.updated_at
             FROM comments c
             JOIN posts p ON p.id = c.post_id
             LEFT JOIN users u ON u.id = c.user_id
             WHERE c.uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Comment::from))
    }

    /// List comments in creation order, optionally only those on one post.
    pub async fn list(&self, post_uuid: Option<&str>) -> Result<Vec<Comment>, sqlx::Error> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            "SELECT c.id, c.uuid, p.uuid AS post_uuid, u.uuid AS sender, c.message,
                    c.created_at, c.updated_at
             FROM comments c
             JOIN posts p ON p.id = c.post_id
             LEFT JOIN users u ON u.id = c.user_id
             WHERE ? IS NULL OR p.uuid = ?
             ORDER BY c.id",
        )
        .bind(post_uuid)
        .bind(post_uuid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    pub async fn update(&self, uuid: &str, message: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE comments SET message = ?, updated_at = datetime('now') WHERE uuid = ?",
        )
        .bind(message)
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn owner_of(&self, uuid: &str) -> Result<Option<EntityOwner>, sqlx::Error> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT u.uuid FROM comments c LEFT JOIN users u ON u.id = c.user_id WHERE c.uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(owner,)| EntityOwner::from_column(owner)))
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, EntityOwner, NewUser};

    async fn setup() -> (Database, i64, String, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(&NewUser {
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
                first_name: "Alice".to_string(),
                last_name: "L".to_string(),
                username: "alice".to_string(),
            })
            .await
            .unwrap();
        let post = db.posts().create(Some(user.id), "t", "c").await.unwrap();
        (db, user.id, user.uuid, post.id)
    }

    #[tokio::test]
    async fn test_create_list_and_filter() {
        let (db, user_id, user_uuid, post_id) = setup().await;
        let other_post = db.posts().create(Some(user_id), "t2", "c2").await.unwrap();

        let c1 = db.comments().create(post_id, Some(user_id), "first").await.unwrap();
        db.comments()
            .create(other_post.id, Some(user_id), "elsewhere")
            .await
            .unwrap();

        assert_eq!(c1.sender.as_deref(), Some(user_uuid.as_str()));
        assert_eq!(db.comments().list(None).await.unwrap().len(), 2);

        let on_first = db.comments().list(Some(&c1.post_uuid)).await.unwrap();
        assert_eq!(on_first.len(), 1);
        assert_eq!(on_first[0].message, "first");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (db, user_id, _, post_id) = setup().await;
        let comment = db.comments().create(post_id, Some(user_id), "m").await.unwrap();

        assert!(db.comments().update(&comment.uuid, "edited").await.unwrap());
        let comment = db.comments().get_by_uuid(&comment.uuid).await.unwrap().unwrap();
        assert_eq!(comment.message, "edited");

        assert!(db.comments().delete(&comment.uuid).await.unwrap());
        assert!(db.comments().get_by_uuid(&comment.uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_post_removes_comments() {
        let (db, user_id, _, post_id) = setup().await;
        let comment = db.comments().create(post_id, Some(user_id), "m").await.unwrap();
        let post_uuid = comment.post_uuid.clone();

        db.posts().delete(&post_uuid).await.unwrap();
        assert!(db.comments().get_by_uuid(&comment.uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owner_of() {
        let (db, user_id, user_uuid, post_id) = setup().await;
        let owned = db.comments().create(post_id, Some(user_id), "m").await.unwrap();
        let legacy = db.comments().create(post_id, None, "m").await.unwrap();

        assert_eq!(
            db.comments().owner_of(&owned.uuid).await.unwrap(),
            Some(EntityOwner::User(user_uuid))
        );
        assert_eq!(
            db.comments().owner_of(&legacy.uuid).await.unwrap(),
            Some(EntityOwner::Nobody)
        );
    }
}
