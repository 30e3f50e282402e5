use anyhow::{Context, Result};
use sqlx::{any::AnyRow, AnyPool, Row};

use crate::domain::{Campaign, CampaignStatus, Permission};

const COLUMNS: &str = "id, title, description, permissions, creator_id, status, created, modified";

#[derive(Clone)]
pub struct CampaignRepository {
    pool: AnyPool,
}

impl CampaignRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, campaign: &Campaign) -> Result<()> {
        // Permissions are an ordered list; stored as JSON to keep that order.
        let permissions = serde_json::to_string(&campaign.permissions)?;

        sqlx::query(
            r#"
            INSERT INTO campaigns (id, title, description, permissions, creator_id, status, created, modified)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&campaign.id)
        .bind(&campaign.title)
        .bind(&campaign.description)
        .bind(permissions)
        .bind(&campaign.creator_id)
        .bind(campaign.status.as_str())
        .bind(campaign.created)
        .bind(campaign.modified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Campaign>> {
        let query = format!("SELECT {} FROM campaigns WHERE id = ?", COLUMNS);
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_campaign).transpose()
    }

    pub async fn list_by_creator(&self, creator_id: &str) -> Result<Vec<Campaign>> {
        let query = format!(
            "SELECT {} FROM campaigns WHERE creator_id = ? ORDER BY created DESC",
            COLUMNS
        );
        let rows = sqlx::query(&query).bind(creator_id).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_campaign).collect()
    }

    /// Moves an active campaign to cancelled. Returns `false` if it was not active.
    pub async fn cancel(&self, id: &str, now: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE campaigns SET status = ?, modified = ? WHERE id = ? AND status = ?",
        )
        .bind(CampaignStatus::Cancelled.as_str())
        .bind(now)
        .bind(id)
        .bind(CampaignStatus::Active.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn row_to_campaign(row: &AnyRow) -> Result<Campaign> {
    let permissions: String = row.try_get("permissions")?;
    let permissions: Vec<Permission> =
        serde_json::from_str(&permissions).context("Stored campaign permissions are not valid JSON")?;
    let status: String = row.try_get("status")?;
    let status: CampaignStatus = status.parse()?;

    Ok(Campaign {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        permissions,
        creator_id: row.try_get("creator_id")?,
        status,
        created: row.try_get("created")?,
        modified: row.try_get("modified")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PermissionLevel;
    use crate::test_support::memory_pool;

    fn campaign(creator: &str, now: i64) -> Campaign {
        Campaign::new(
            "Sleep study".into(),
            "Share your sleep data".into(),
            vec![
                Permission {
                    stream_id: Some("sleep".into()),
                    tag: None,
                    default_name: "Sleep".into(),
                    level: PermissionLevel::Read,
                },
                Permission {
                    stream_id: None,
                    tag: Some("night".into()),
                    default_name: "Night".into(),
                    level: PermissionLevel::Contribute,
                },
            ],
            creator.into(),
            now,
        )
    }

    #[tokio::test]
    async fn test_create_and_find_keeps_permission_order() {
        let repo = CampaignRepository::new(memory_pool().await);
        let c = campaign("alice", 10);
        repo.create(&c).await.unwrap();

        let stored = repo.find_by_id(&c.id).await.unwrap().unwrap();

        assert_eq!(stored, c);
        assert_eq!(stored.permissions[1].tag.as_deref(), Some("night"));
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_creator_newest_first() {
        let repo = CampaignRepository::new(memory_pool().await);
        let older = campaign("alice", 10);
        let newer = campaign("alice", 20);
        let other = campaign("bob", 30);
        for c in [&older, &newer, &other] {
            repo.create(c).await.unwrap();
        }

        let listed = repo.list_by_creator("alice").await.unwrap();

        assert_eq!(listed, vec![newer, older]);
    }

    #[tokio::test]
    async fn test_unknown_stored_status_is_an_error() {
        let pool = memory_pool().await;
        let repo = CampaignRepository::new(pool.clone());
        let c = campaign("alice", 10);
        repo.create(&c).await.unwrap();

        sqlx::query("UPDATE campaigns SET status = 'archived' WHERE id = ?")
            .bind(&c.id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(repo.find_by_id(&c.id).await.is_err());
        assert!(repo.list_by_creator("alice").await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_only_once() {
        let repo = CampaignRepository::new(memory_pool().await);
        let c = campaign("alice", 10);
        repo.create(&c).await.unwrap();

        assert!(repo.cancel(&c.id, 50).await.unwrap());
        assert!(!repo.cancel(&c.id, 60).await.unwrap());

        let stored = repo.find_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Cancelled);
        assert_eq!(stored.modified, 50);
    }
}
