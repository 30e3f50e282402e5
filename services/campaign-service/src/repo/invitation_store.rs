use sqlx::{any::AnyRow, AnyConnection, AnyPool, Row};
use thiserror::Error;

use crate::domain::{Invitation, InvitationStatus};
use crate::repo::is_unique_violation;

/// Most records returned by a per-user history query.
pub const HISTORY_LIMIT: i64 = 1000;

const COLUMNS: &str = "v.logical_id, v.version_seq, v.access_token, v.status, v.created, v.modified, \
                       v.campaign_id, v.requester_id, v.requestee_id, v.superseded_by";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invitation {0} already exists")]
    DuplicateId(String),

    #[error("invitation {id} is no longer at version {expected}")]
    StaleVersion { id: String, expected: i64 },

    #[error("invitation {0} not found")]
    NotFound(String),

    /// The requestee already holds an open invitation for the campaign.
    #[error("invitation {0} is still open for this campaign and requestee")]
    AlreadyOpen(String),

    #[error("invitation {id} version {version} is already superseded")]
    BrokenChain { id: String, version: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Append-only storage of invitation versions.
///
/// `invitation_versions` holds every version keyed by `(logical_id, version_seq)`;
/// `invitation_heads` points at the live version of each logical invitation.
/// Writers never update a version's content, only its `superseded_by` link.
/// `invitation_open` holds one row per (campaign, requestee) with a
/// non-terminal invitation; its primary key keeps concurrent creates from
/// opening two.
#[derive(Clone)]
pub struct InvitationStore {
    pool: AnyPool,
}

impl InvitationStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Starts a new chain. The invitation must be at version 1.
    pub async fn insert(&self, invitation: &Invitation) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM invitation_heads WHERE logical_id = ?")
            .bind(&invitation.id)
            .fetch_one(&mut *tx)
            .await?;
        if existing.0 > 0 {
            return Err(StoreError::DuplicateId(invitation.id.clone()));
        }

        if !invitation.status.is_terminal() {
            let holder: Option<(String,)> = sqlx::query_as(
                "SELECT logical_id FROM invitation_open WHERE campaign_id = ? AND requestee_id = ?",
            )
            .bind(&invitation.campaign_id)
            .bind(&invitation.requestee_id)
            .fetch_optional(&mut *tx)
            .await?;
            if let Some((open_id,)) = holder {
                return Err(StoreError::AlreadyOpen(open_id));
            }

            let claimed = sqlx::query(
                "INSERT INTO invitation_open (campaign_id, requestee_id, logical_id) VALUES (?, ?, ?)",
            )
            .bind(&invitation.campaign_id)
            .bind(&invitation.requestee_id)
            .bind(&invitation.id)
            .execute(&mut *tx)
            .await;
            if let Err(e) = claimed {
                if !is_unique_violation(&e) {
                    return Err(e.into());
                }
                // Lost the race to another create; report the winner.
                drop(tx);
                return Err(match self.open_for(&invitation.campaign_id, &invitation.requestee_id).await? {
                    Some(open_id) => StoreError::AlreadyOpen(open_id),
                    None => StoreError::Database(e),
                });
            }
        }

        sqlx::query("INSERT INTO invitation_heads (logical_id, live_seq) VALUES (?, ?)")
            .bind(&invitation.id)
            .bind(invitation.version)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::DuplicateId(invitation.id.clone())
                } else {
                    StoreError::Database(e)
                }
            })?;

        insert_version(&mut tx, invitation).await?;
        tx.commit().await?;

        Ok(())
    }

    /// Replaces version `expected_seq` of invitation `id` with `next`, in one
    /// transaction: the live pointer moves, the old record gets its
    /// `superseded_by` link and `next` is inserted. If the live pointer is
    /// no longer at `expected_seq` nothing is written.
    pub async fn append_version(
        &self,
        id: &str,
        expected_seq: i64,
        next: &Invitation,
    ) -> Result<(), StoreError> {
        debug_assert_eq!(next.id, id);
        debug_assert_eq!(next.version, expected_seq + 1);

        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            "UPDATE invitation_heads SET live_seq = ? WHERE logical_id = ? AND live_seq = ?",
        )
        .bind(next.version)
        .bind(id)
        .bind(expected_seq)
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM invitation_heads WHERE logical_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if existing.0 == 0 {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::StaleVersion {
                    id: id.to_string(),
                    expected: expected_seq,
                }
            });
        }

        let superseded = sqlx::query(
            "UPDATE invitation_versions SET superseded_by = ?
             WHERE logical_id = ? AND version_seq = ? AND superseded_by IS NULL",
        )
        .bind(next.version)
        .bind(id)
        .bind(expected_seq)
        .execute(&mut *tx)
        .await?;

        if superseded.rows_affected() != 1 {
            return Err(StoreError::BrokenChain {
                id: id.to_string(),
                version: expected_seq,
            });
        }

        insert_version(&mut tx, next).await.map_err(|e| match e {
            StoreError::DuplicateId(id) => StoreError::StaleVersion {
                id,
                expected: expected_seq,
            },
            other => other,
        })?;

        if next.status.is_terminal() {
            sqlx::query("DELETE FROM invitation_open WHERE logical_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_latest(&self, id: &str) -> Result<Option<Invitation>, StoreError> {
        let query = format!(
            "SELECT {} FROM invitation_versions v
             INNER JOIN invitation_heads h ON h.logical_id = v.logical_id AND h.live_seq = v.version_seq
             WHERE v.logical_id = ?",
            COLUMNS
        );
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_invitation).transpose().map_err(StoreError::from)
    }

    /// Every version of one invitation, oldest first.
    pub async fn get_versions(&self, id: &str) -> Result<Vec<Invitation>, StoreError> {
        let query = format!(
            "SELECT {} FROM invitation_versions v WHERE v.logical_id = ? ORDER BY v.version_seq ASC",
            COLUMNS
        );
        let rows = sqlx::query(&query).bind(id).fetch_all(&self.pool).await?;

        rows_to_invitations(&rows)
    }

    /// Live and superseded records where the user is requester or requestee,
    /// most recently modified first, capped at [`HISTORY_LIMIT`].
    pub async fn get_history_for_user(&self, user_id: &str) -> Result<Vec<Invitation>, StoreError> {
        let query = format!(
            "SELECT {} FROM invitation_versions v
             WHERE v.requester_id = ? OR v.requestee_id = ?
             ORDER BY v.modified DESC, v.version_seq DESC
             LIMIT ?",
            COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(user_id)
            .bind(HISTORY_LIMIT)
            .fetch_all(&self.pool)
            .await?;

        rows_to_invitations(&rows)
    }

    pub async fn live_for_requestee(&self, user_id: &str) -> Result<Vec<Invitation>, StoreError> {
        self.live_where("v.requestee_id = ?", user_id).await
    }

    pub async fn live_for_campaign(&self, campaign_id: &str) -> Result<Vec<Invitation>, StoreError> {
        self.live_where("v.campaign_id = ?", campaign_id).await
    }

    /// Id of the open invitation held for a campaign and requestee, if any.
    pub async fn open_for(&self, campaign_id: &str, requestee_id: &str) -> Result<Option<String>, StoreError> {
        let holder: Option<(String,)> = sqlx::query_as(
            "SELECT logical_id FROM invitation_open WHERE campaign_id = ? AND requestee_id = ?",
        )
        .bind(campaign_id)
        .bind(requestee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(holder.map(|(id,)| id))
    }

    async fn live_where(&self, condition: &str, value: &str) -> Result<Vec<Invitation>, StoreError> {
        let query = format!(
            "SELECT {} FROM invitation_versions v
             INNER JOIN invitation_heads h ON h.logical_id = v.logical_id AND h.live_seq = v.version_seq
             WHERE {}
             ORDER BY v.modified DESC",
            COLUMNS, condition
        );
        let rows = sqlx::query(&query).bind(value).fetch_all(&self.pool).await?;

        rows_to_invitations(&rows)
    }
}

async fn insert_version(conn: &mut AnyConnection, invitation: &Invitation) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO invitation_versions
            (logical_id, version_seq, access_token, status, created, modified,
             campaign_id, requester_id, requestee_id, superseded_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&invitation.id)
    .bind(invitation.version)
    .bind(invitation.access_token.clone())
    .bind(invitation.status.as_str())
    .bind(invitation.created)
    .bind(invitation.modified)
    .bind(&invitation.campaign_id)
    .bind(&invitation.requester_id)
    .bind(&invitation.requestee_id)
    .bind(invitation.superseded_by)
    .execute(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StoreError::DuplicateId(invitation.id.clone())
        } else {
            StoreError::Database(e)
        }
    })?;

    Ok(())
}

fn rows_to_invitations(rows: &[AnyRow]) -> Result<Vec<Invitation>, StoreError> {
    rows.iter()
        .map(row_to_invitation)
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

fn row_to_invitation(row: &AnyRow) -> Result<Invitation, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<InvitationStatus>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(Invitation {
        id: row.try_get("logical_id")?,
        version: row.try_get("version_seq")?,
        campaign_id: row.try_get("campaign_id")?,
        requester_id: row.try_get("requester_id")?,
        requestee_id: row.try_get("requestee_id")?,
        access_token: row.try_get("access_token")?,
        status,
        created: row.try_get("created")?,
        modified: row.try_get("modified")?,
        superseded_by: row.try_get("superseded_by")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_pool;
    use InvitationStatus::*;

    fn fresh(now: i64) -> Invitation {
        Invitation::new("campaign-1".into(), "alice".into(), "bob".into(), None, now)
    }

    #[tokio::test]
    async fn test_insert_then_get_latest() {
        let store = InvitationStore::new(memory_pool().await);
        let invitation = fresh(100);

        store.insert(&invitation).await.unwrap();

        assert_eq!(store.get_latest(&invitation.id).await.unwrap(), Some(invitation));
        assert_eq!(store.get_latest("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_duplicate_id() {
        let store = InvitationStore::new(memory_pool().await);
        let invitation = fresh(100);
        store.insert(&invitation).await.unwrap();

        let err = store.insert(&invitation).await.unwrap_err();

        assert!(matches!(err, StoreError::DuplicateId(id) if id == invitation.id));
        assert_eq!(store.get_versions(&invitation.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_open_invitation_for_same_pair_rejected() {
        let store = InvitationStore::new(memory_pool().await);
        let first = fresh(100);
        store.insert(&first).await.unwrap();

        let second = fresh(105);
        let err = store.insert(&second).await.unwrap_err();

        assert!(matches!(err, StoreError::AlreadyOpen(ref id) if *id == first.id));
        assert!(store.get_versions(&second.id).await.unwrap().is_empty());
        assert_eq!(store.open_for("campaign-1", "bob").await.unwrap(), Some(first.id.clone()));

        // Another campaign or requestee is a different slot.
        let elsewhere = Invitation::new("campaign-2".into(), "alice".into(), "bob".into(), None, 106);
        store.insert(&elsewhere).await.unwrap();
    }

    #[tokio::test]
    async fn test_terminal_version_frees_open_slot() {
        let store = InvitationStore::new(memory_pool().await);
        let first = fresh(100);
        store.insert(&first).await.unwrap();

        let seen = first.next_version(Seen, None, 110);
        store.append_version(&first.id, 1, &seen).await.unwrap();
        assert!(matches!(store.insert(&fresh(111)).await, Err(StoreError::AlreadyOpen(_))));

        let refused = seen.next_version(Refused, None, 120);
        store.append_version(&first.id, 2, &refused).await.unwrap();

        assert_eq!(store.open_for("campaign-1", "bob").await.unwrap(), None);
        let again = fresh(130);
        store.insert(&again).await.unwrap();
        assert_eq!(store.open_for("campaign-1", "bob").await.unwrap(), Some(again.id));
    }

    #[tokio::test]
    async fn test_chain_after_n_transitions() {
        let store = InvitationStore::new(memory_pool().await);
        let mut current = fresh(100);
        store.insert(&current).await.unwrap();

        let statuses = [Seen, Accepted, Refused];
        for (i, status) in statuses.iter().enumerate() {
            let next = current.next_version(*status, None, 200 + i as i64);
            store.append_version(&current.id, current.version, &next).await.unwrap();
            current = next;
        }

        let versions = store.get_versions(&current.id).await.unwrap();
        assert_eq!(versions.len(), statuses.len() + 1);
        assert_eq!(versions.iter().filter(|v| v.is_live()).count(), 1);

        // Walk supersede links from the oldest record to the live one.
        let mut hops = 0;
        let mut record = &versions[0];
        while let Some(next_seq) = record.superseded_by {
            record = versions.iter().find(|v| v.version == next_seq).unwrap();
            hops += 1;
            assert!(hops <= versions.len(), "cycle in version chain");
        }
        assert_eq!(hops, statuses.len());
        assert_eq!(record, &current);
        assert_eq!(store.get_latest(&current.id).await.unwrap(), Some(current));
    }

    #[tokio::test]
    async fn test_stale_append_writes_nothing() {
        let store = InvitationStore::new(memory_pool().await);
        let first = fresh(100);
        store.insert(&first).await.unwrap();

        let accepted = first.next_version(Accepted, None, 110);
        store.append_version(&first.id, 1, &accepted).await.unwrap();

        // A writer that still believes version 1 is live.
        let late = first.next_version(Refused, None, 120);
        let err = store.append_version(&first.id, 1, &late).await.unwrap_err();

        assert!(matches!(err, StoreError::StaleVersion { expected: 1, .. }));
        let versions = store.get_versions(&first.id).await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(store.get_latest(&first.id).await.unwrap().unwrap().status, Accepted);
    }

    #[tokio::test]
    async fn test_append_to_missing_invitation() {
        let store = InvitationStore::new(memory_pool().await);
        let ghost = fresh(100);
        let next = ghost.next_version(Accepted, None, 110);

        let err = store.append_version(&ghost.id, 1, &next).await.unwrap_err();

        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.get_versions(&ghost.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_for_user_newest_first() {
        let store = InvitationStore::new(memory_pool().await);
        let a = fresh(100);
        store.insert(&a).await.unwrap();
        let a2 = a.next_version(Accepted, None, 300);
        store.append_version(&a.id, 1, &a2).await.unwrap();

        let b = Invitation::new("campaign-2".into(), "carol".into(), "bob".into(), None, 200);
        store.insert(&b).await.unwrap();

        let unrelated = Invitation::new("campaign-3".into(), "carol".into(), "dave".into(), None, 250);
        store.insert(&unrelated).await.unwrap();

        let history = store.get_history_for_user("bob").await.unwrap();
        let modified: Vec<i64> = history.iter().map(|i| i.modified).collect();

        assert_eq!(modified, vec![300, 200, 100]);
        assert!(history.iter().all(|i| i.involves("bob")));
        assert!(!history[2].is_live());
    }

    #[tokio::test]
    async fn test_live_queries_skip_superseded_records() {
        let store = InvitationStore::new(memory_pool().await);
        let a = fresh(100);
        store.insert(&a).await.unwrap();
        let a2 = a.next_version(Seen, None, 110);
        store.append_version(&a.id, 1, &a2).await.unwrap();

        let for_bob = store.live_for_requestee("bob").await.unwrap();
        let for_campaign = store.live_for_campaign("campaign-1").await.unwrap();

        assert_eq!(for_bob, vec![a2.clone()]);
        assert_eq!(for_campaign, vec![a2]);
        assert!(store.live_for_requestee("alice").await.unwrap().is_empty());
    }
}
