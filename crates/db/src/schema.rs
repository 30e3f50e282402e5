use anyhow::Result;
use sqlx::AnyPool;

use crate::pool::Backend;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        username VARCHAR(64) NULL UNIQUE,
        local_id VARCHAR(64) NULL,
        password_hash VARCHAR(255) NULL,
        pryv_username VARCHAR(64) NULL UNIQUE,
        pryv_id VARCHAR(64) NULL,
        created BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accesses (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        user_id VARCHAR(64) NOT NULL,
        created BIGINT NOT NULL,
        valid_until BIGINT NOT NULL,
        is_valid BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS campaigns (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        title VARCHAR(256) NOT NULL,
        description TEXT NOT NULL,
        permissions TEXT NOT NULL,
        creator_id VARCHAR(64) NOT NULL,
        status VARCHAR(16) NOT NULL,
        created BIGINT NOT NULL,
        modified BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invitation_versions (
        logical_id VARCHAR(64) NOT NULL,
        version_seq BIGINT NOT NULL,
        access_token VARCHAR(255) NULL,
        status VARCHAR(16) NOT NULL,
        created BIGINT NOT NULL,
        modified BIGINT NOT NULL,
        campaign_id VARCHAR(64) NOT NULL,
        requester_id VARCHAR(64) NOT NULL,
        requestee_id VARCHAR(64) NOT NULL,
        superseded_by BIGINT NULL,
        PRIMARY KEY (logical_id, version_seq)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invitation_heads (
        logical_id VARCHAR(64) NOT NULL PRIMARY KEY,
        live_seq BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS invitation_open (
        campaign_id VARCHAR(64) NOT NULL,
        requestee_id VARCHAR(64) NOT NULL,
        logical_id VARCHAR(64) NOT NULL,
        PRIMARY KEY (campaign_id, requestee_id)
    )
    "#,
];

/// (table, index name, columns)
const INDEXES: &[(&str, &str, &str)] = &[
    ("accesses", "idx_accesses_user", "user_id"),
    ("campaigns", "idx_campaigns_creator", "creator_id, created"),
    ("invitation_versions", "idx_invitation_versions_requester", "requester_id, modified"),
    ("invitation_versions", "idx_invitation_versions_requestee", "requestee_id, modified"),
    ("invitation_versions", "idx_invitation_versions_campaign", "campaign_id"),
];

/// Creates the tables and indexes the service needs. Safe to run on every start.
pub async fn migrate(pool: &AnyPool, backend: Backend) -> Result<()> {
    for statement in TABLES {
        sqlx::query(*statement).execute(pool).await?;
    }

    for (table, name, columns) in INDEXES {
        ensure_index(pool, backend, table, name, columns).await?;
    }

    tracing::info!("Database schema ready ({} tables, {} indexes)", TABLES.len(), INDEXES.len());
    Ok(())
}

async fn ensure_index(
    pool: &AnyPool,
    backend: Backend,
    table: &str,
    name: &str,
    columns: &str,
) -> Result<()> {
    match backend {
        Backend::Sqlite => {
            let statement = format!("CREATE INDEX IF NOT EXISTS {} ON {} ({})", name, table, columns);
            sqlx::query(&statement).execute(pool).await?;
        }
        Backend::MySql => {
            // MySQL has no CREATE INDEX IF NOT EXISTS.
            let existing: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM information_schema.statistics
                 WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ?",
            )
            .bind(table)
            .bind(name)
            .fetch_one(pool)
            .await?;

            if existing.0 == 0 {
                let statement = format!("CREATE INDEX {} ON {} ({})", name, table, columns);
                sqlx::query(&statement).execute(pool).await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;
    use sqlx::Row;

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();

        migrate(&pool, Backend::Sqlite).await.unwrap();
        migrate(&pool, Backend::Sqlite).await.unwrap();

        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
        let names: Vec<String> = rows.iter().map(|r| r.get("name")).collect();

        for table in ["accesses", "campaigns", "invitation_heads", "invitation_open", "invitation_versions", "users"] {
            assert!(names.iter().any(|n| n == table), "missing table {}", table);
        }
    }

    #[test]
    fn test_backend_from_url() {
        assert_eq!(Backend::from_url("mysql://root@localhost/db").unwrap(), Backend::MySql);
        assert_eq!(Backend::from_url("sqlite::memory:").unwrap(), Backend::Sqlite);
        assert!(Backend::from_url("postgres://localhost").is_err());
    }
}
