use anyhow::Result;
use sqlx::{any::AnyRow, AnyPool, Row};

use crate::domain::{User, UserRef};
use crate::repo::is_unique_violation;

const COLUMNS: &str = "id, username, local_id, password_hash, pryv_username, pryv_id, created";

#[derive(Clone)]
pub struct UserRepository {
    pool: AnyPool,
}

impl UserRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Returns `false` when the username or Pryv username is already taken.
    pub async fn create(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO users (id, username, local_id, password_hash, pryv_username, pryv_id, created)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(user.username.clone())
        .bind(user.local_id.clone())
        .bind(user.password_hash.clone())
        .bind(user.pryv_username.clone())
        .bind(user.pryv_id.clone())
        .bind(user.created)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        self.find_where("id = ?", id).await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_where("username = ?", username).await
    }

    pub async fn find_by_pryv_username(&self, pryv_username: &str) -> Result<Option<User>> {
        self.find_where("pryv_username = ?", pryv_username).await
    }

    pub async fn find(&self, user_ref: &UserRef) -> Result<Option<User>> {
        match user_ref {
            UserRef::Id(id) => self.find_by_id(id).await,
            UserRef::Username(username) => self.find_by_username(username).await,
            UserRef::PryvUsername(pryv_username) => self.find_by_pryv_username(pryv_username).await,
        }
    }

    /// Attaches a Pryv identity to a user that has none yet. Returns `false`
    /// if the user already has one or the Pryv username is taken.
    pub async fn link_pryv(&self, id: &str, pryv_username: &str, pryv_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET pryv_username = ?, pryv_id = ? WHERE id = ? AND pryv_username IS NULL",
        )
        .bind(pryv_username)
        .bind(pryv_id)
        .bind(id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() == 1),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_where(&self, condition: &str, value: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE {}", COLUMNS, condition);
        let row = sqlx::query(&query).bind(value).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(row_to_user).transpose()?)
    }
}

fn row_to_user(row: &AnyRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        local_id: row.try_get("local_id")?,
        password_hash: row.try_get("password_hash")?,
        pryv_username: row.try_get("pryv_username")?,
        pryv_id: row.try_get("pryv_id")?,
        created: row.try_get("created")?,
    })
}
