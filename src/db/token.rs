//! Refresh token storage: the set of live refresh tokens per user.
//!
//! Presence of a row is the only thing that makes a refresh token usable.
//! Every mutation that consumes a token goes through [`RefreshTokenStore::redeem`],
//! which removes the token and reacts to its absence in one transaction, so two
//! concurrent redemptions of the same token can never both succeed.

use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: SqlitePool,
    redeem_lock: Arc<Mutex<()>>,
}

/// Outcome of presenting a refresh token for consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    /// The token was live and has been removed (and its successor stored, if any).
    Redeemed,
    /// The token was not in the set. Every remaining token of the user was deleted.
    Reused { cleared: u64 },
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool, redeem_lock: Arc<Mutex<()>>) -> Self {
        Self { pool, redeem_lock }
    }

    /// Append a token to the user's set.
    pub async fn add(&self, user_id: i64, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO refresh_tokens (user_id, token) VALUES (?, ?)")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove `token` from the user's set if present, storing `successor` in its place.
    ///
    /// If `token` is not in the set it was already rotated out or logged out, and
    /// the whole set is cleared instead.
    pub async fn redeem(
        &self,
        user_id: i64,
        token: &str,
        successor: Option<&str>,
    ) -> Result<Redemption, sqlx::Error> {
        let _guard = self.redeem_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ? AND token = ?")
            .bind(user_id)
            .bind(token)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let outcome = if removed == 0 {
            let cleared = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            Redemption::Reused { cleared }
        } else {
            if let Some(successor) = successor {
                sqlx::query("INSERT INTO refresh_tokens (user_id, token) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(successor)
                    .execute(&mut *tx)
                    .await?;
            }
            Redemption::Redeemed
        };

        tx.commit().await?;
        Ok(outcome)
    }

    #[cfg(test)]
    pub(crate) async fn contains(&self, user_id: i64, token: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM refresh_tokens WHERE user_id = ? AND token = ?")
                .bind(user_id)
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// List a user's live tokens in issuance order.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT token FROM refresh_tokens WHERE user_id = ? ORDER BY id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(token,)| token).collect())
    }

    /// Delete every token of a user. Returns how many were deleted.
    pub async fn revoke_all(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, NewUser};

    use super::*;

    async fn setup() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db
            .users()
            .create(&NewUser {
                email: "bob@example.com".to_string(),
                password_hash: "hash".to_string(),
                first_name: "Bob".to_string(),
                last_name: "Builder".to_string(),
                username: "bob".to_string(),
            })
            .await
            .unwrap();
        (db, user.id)
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let (db, user_id) = setup().await;

        db.tokens().add(user_id, "a").await.unwrap();
        db.tokens().add(user_id, "b").await.unwrap();

        assert_eq!(db.tokens().list_by_user(user_id).await.unwrap(), vec!["a", "b"]);
        assert!(db.tokens().contains(user_id, "a").await.unwrap());
        assert!(!db.tokens().contains(user_id, "c").await.unwrap());
    }

    #[tokio::test]
    async fn test_token_belongs_to_one_user() {
        let (db, user_id) = setup().await;
        let other = db
            .users()
            .create(&NewUser {
                email: "carol@example.com".to_string(),
                password_hash: "hash".to_string(),
                first_name: "Carol".to_string(),
                last_name: "C".to_string(),
                username: "carol".to_string(),
            })
            .await
            .unwrap();

        db.tokens().add(user_id, "a").await.unwrap();
        assert!(db.tokens().add(other.id, "a").await.is_err());
    }

    #[tokio::test]
    async fn test_redeem_with_successor_rotates() {
        let (db, user_id) = setup().await;
        db.tokens().add(user_id, "a").await.unwrap();
        db.tokens().add(user_id, "other-session").await.unwrap();

        let outcome = db.tokens().redeem(user_id, "a", Some("b")).await.unwrap();
        assert_eq!(outcome, Redemption::Redeemed);

        let mut live = db.tokens().list_by_user(user_id).await.unwrap();
        live.sort();
        assert_eq!(live, vec!["b", "other-session"]);
    }

    #[tokio::test]
    async fn test_redeem_without_successor_removes() {
        let (db, user_id) = setup().await;
        db.tokens().add(user_id, "a").await.unwrap();

        let outcome = db.tokens().redeem(user_id, "a", None).await.unwrap();
        assert_eq!(outcome, Redemption::Redeemed);
        assert!(db.tokens().list_by_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redeem_absent_token_clears_set() {
        let (db, user_id) = setup().await;
        db.tokens().add(user_id, "b").await.unwrap();
        db.tokens().add(user_id, "c").await.unwrap();

        let outcome = db.tokens().redeem(user_id, "a", Some("d")).await.unwrap();
        assert_eq!(outcome, Redemption::Reused { cleared: 2 });

        assert!(db.tokens().list_by_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_double_redeem_only_first_wins() {
        let (db, user_id) = setup().await;
        db.tokens().add(user_id, "a").await.unwrap();

        let first = db.tokens().redeem(user_id, "a", Some("b")).await.unwrap();
        let second = db.tokens().redeem(user_id, "a", Some("c")).await.unwrap();

        assert_eq!(first, Redemption::Redeemed);
        assert_eq!(second, Redemption::Reused { cleared: 1 });
        assert!(db.tokens().list_by_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_revoke_all() {
        let (db, user_id) = setup().await;
        db.tokens().add(user_id, "a").await.unwrap();
        db.tokens().add(user_id, "b").await.unwrap();

        assert_eq!(db.tokens().revoke_all(user_id).await.unwrap(), 2);
        assert_eq!(db.tokens().revoke_all(user_id).await.unwrap(), 0);
    }
}
