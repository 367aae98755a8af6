use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest as _, Sha256};

use crate::db::Database;
use crate::error::{Error, Result, ValidationErrors};
use crate::model::User;

/// Sessions older than this are treated as absent.
const SESSION_TTL_DAYS: i64 = 14;

/// Identity and session state. The catalog itself only ever consumes the
/// resulting `User`; credentials never leave this module.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn create_user(&self, username: &str, password: &str) -> Result<User>;
    async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>>;
    async fn get_user(&self, id: i64) -> Result<Option<User>>;
    /// Books owned by the user keep existing with a null owner.
    async fn delete_user(&self, id: i64) -> Result<()>;
    async fn set_password(&self, user_id: i64, password: &str) -> Result<()>;

    async fn create_session(&self, user_id: i64) -> Result<String>;
    async fn session_user(&self, token: &str) -> Result<Option<User>>;
    async fn delete_session(&self, token: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteIdentityStore {
    db: Database,
}

impl SqliteIdentityStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
            .bind(username)
            .bind(hash_password(password))
            .execute(self.db.pool())
            .await;

        match result {
            Ok(done) => Ok(User {
                id: done.last_insert_rowid(),
                username: username.to_owned(),
            }),
            Err(sqlx::Error::Database(db_err))
                if db_err.message().contains("UNIQUE constraint failed") =>
            {
                let mut errors = ValidationErrors::new();
                errors.add_field("username", "this username is already taken");
                Err(Error::Validation(errors))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(self.db.pool())
                .await?;

        let Some((id, stored)) = row else {
            return Ok(None);
        };
        if !verify_password(password, &stored) {
            return Ok(None);
        }

        Ok(Some(User {
            id,
            username: username.to_owned(),
        }))
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn set_password(&self, user_id: i64, password: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(hash_password(password))
            .bind(user_id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn create_session(&self, user_id: i64) -> Result<String> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(Utc::now())
            .execute(self.db.pool())
            .await?;
        Ok(token)
    }

    async fn session_user(&self, token: &str) -> Result<Option<User>> {
        let row: Option<(i64, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT u.id, u.username, s.created_at \
             FROM sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?",
        )
        .bind(token)
        .fetch_optional(self.db.pool())
        .await?;

        let Some((id, username, created_at)) = row else {
            return Ok(None);
        };
        if Utc::now() - created_at > Duration::days(SESSION_TTL_DAYS) {
            return Ok(None);
        }

        Ok(Some(User { id, username }))
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

/// `salt$hex(sha256(salt:password))`. The salt is a fresh uuid per hash.
fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{salt}${}", digest(&salt, password))
}

fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    digest(salt, password) == expected
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let stored = hash_password("correct horse");
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "no-dollar-sign"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    async fn store() -> SqliteIdentityStore {
        let db = Database::open_in_memory().await.unwrap();
        SqliteIdentityStore::new(db)
    }

    #[tokio::test]
    async fn duplicate_username_is_a_validation_error() {
        let store = store().await;
        store.create_user("alice", "password123").await.unwrap();

        let err = store.create_user("alice", "other456").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let store = store().await;
        let user = store.create_user("alice", "password123").await.unwrap();

        let token = store.create_session(user.id).await.unwrap();
        let resolved = store.session_user(&token).await.unwrap().unwrap();
        assert_eq!(resolved, user);

        store.delete_session(&token).await.unwrap();
        assert!(store.session_user(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_session_is_absent() {
        let store = store().await;
        let user = store.create_user("alice", "password123").await.unwrap();

        let token = "stale-token";
        sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user.id)
            .bind(Utc::now() - Duration::days(SESSION_TTL_DAYS + 1))
            .execute(store.db.pool())
            .await
            .unwrap();

        assert!(store.session_user(token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_credentials_resolve_to_none() {
        let store = store().await;
        store.create_user("alice", "password123").await.unwrap();

        assert!(
            store
                .verify_credentials("alice", "nope")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .verify_credentials("bob", "password123")
                .await
                .unwrap()
                .is_none()
        );
    }
}
