use anyhow::Result;
use sqlx::{AnyPool, Row};

use crate::domain::Access;

#[derive(Clone)]
pub struct AccessRepository {
    pool: AnyPool,
}

impl AccessRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, access: &Access) -> Result<()> {
        sqlx::query(
            "INSERT INTO accesses (id, user_id, created, valid_until, is_valid) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&access.id)
        .bind(&access.user_id)
        .bind(access.created)
        .bind(access.valid_until)
        .bind(i64::from(access.is_valid))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Access>> {
        let row = sqlx::query(
            "SELECT id, user_id, created, valid_until, is_valid FROM accesses WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let access = match row {
            Some(row) => Some(Access {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                created: row.try_get("created")?,
                valid_until: row.try_get("valid_until")?,
                is_valid: row.try_get::<i64, _>("is_valid")? != 0,
            }),
            None => None,
        };

        Ok(access)
    }

    /// Revokes an access regardless of its expiry.
    pub async fn invalidate(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE accesses SET is_valid = 0 WHERE id = ? AND is_valid = 1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_pool;

    #[tokio::test]
    async fn test_create_find_invalidate() {
        let repo = AccessRepository::new(memory_pool().await);
        let access = Access::new("u1".into(), 1_000, 3_600);
        repo.create(&access).await.unwrap();

        assert_eq!(repo.find_by_id(&access.id).await.unwrap(), Some(access.clone()));

        assert!(repo.invalidate(&access.id).await.unwrap());
        assert!(!repo.invalidate(&access.id).await.unwrap());

        let stored = repo.find_by_id(&access.id).await.unwrap().unwrap();
        assert!(!stored.is_valid);
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }
}
