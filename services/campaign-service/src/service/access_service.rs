use authz::{AccessLookup, TokenCodec};
use common::time::Clock;
use common::{AppError, AppResult};
use std::sync::Arc;

use crate::domain::{Access, AccessGrant};
use crate::repo::AccessRepository;

#[derive(Clone)]
pub struct AccessService {
    repo: AccessRepository,
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
    ttl_seconds: i64,
}

impl AccessService {
    pub fn new(repo: AccessRepository, codec: TokenCodec, clock: Arc<dyn Clock>, ttl_seconds: i64) -> Self {
        Self {
            repo,
            codec,
            clock,
            ttl_seconds,
        }
    }

    /// Stores a new access for `user_id` and signs a bearer token for it.
    pub async fn open(&self, user_id: &str) -> AppResult<AccessGrant> {
        let access = Access::new(user_id.to_string(), self.clock.now(), self.ttl_seconds);
        self.repo.create(&access).await?;

        let token = self.codec.issue(user_id, &access.id, access.valid_until)?;
        tracing::debug!("Opened access {} for user {}", access.id, user_id);

        Ok(AccessGrant {
            id: access.id,
            token,
            valid_until: access.valid_until,
        })
    }

    pub async fn revoke(&self, access_id: &str) -> AppResult<()> {
        if !self.repo.invalidate(access_id).await? {
            return Err(AppError::Forbidden("Access is already revoked".to_string()));
        }
        tracing::info!("Revoked access {}", access_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccessLookup for AccessService {
    async fn is_access_valid(&self, access_id: &str) -> anyhow::Result<bool> {
        let now = self.clock.now();
        Ok(self
            .repo
            .find_by_id(access_id)
            .await?
            .map(|access| access.is_valid_at(now))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestContext;

    #[tokio::test]
    async fn test_open_then_revoke() {
        let ctx = TestContext::new().await;
        let grant = ctx.accesses.open("user-1").await.unwrap();

        assert!(ctx.accesses.is_access_valid(&grant.id).await.unwrap());
        let claims = ctx.codec.verify_token(&grant.token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.access_id, grant.id);

        ctx.accesses.revoke(&grant.id).await.unwrap();
        assert!(!ctx.accesses.is_access_valid(&grant.id).await.unwrap());
        assert!(matches!(ctx.accesses.revoke(&grant.id).await, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_access_expires_with_clock() {
        let ctx = TestContext::new().await;
        let grant = ctx.accesses.open("user-1").await.unwrap();

        ctx.clock.advance(common::config::DEFAULT_ACCESS_TTL_SECONDS);

        assert!(!ctx.accesses.is_access_valid(&grant.id).await.unwrap());
        assert!(!ctx.accesses.is_access_valid("unknown").await.unwrap());
    }
}
