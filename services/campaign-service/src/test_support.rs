// Shared fixtures for the service's unit tests.
use authz::TokenCodec;
use common::config::DEFAULT_ACCESS_TTL_SECONDS;
use common::time::{timestamp, Clock};
use sqlx::AnyPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::clients::{AccessCheck, AccessVerifier};
use crate::domain::{Permission, PermissionLevel, User};
use crate::repo::{AccessRepository, CampaignRepository, InvitationStore, UserRepository};
use crate::service::{AccessService, CampaignService, InvitationService, NewCampaign, UserService};

pub const TEST_SECRET: &str = "test-secret";

pub async fn memory_pool() -> AnyPool {
    let pool = db::create_pool("sqlite::memory:").await.unwrap();
    db::migrate(&pool, db::Backend::Sqlite).await.unwrap();
    pool
}

/// Clock that only moves when told to. Starts at the wall clock, since
/// issued tokens are checked against real time.
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new() -> Self {
        Self(AtomicI64::new(timestamp()))
    }

    pub fn advance(&self, seconds: i64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Answers `UnknownUser` for anything not registered with `set`.
#[derive(Default)]
pub struct FakeVerifier {
    answers: Mutex<HashMap<(String, String), AccessCheck>>,
}

impl FakeVerifier {
    pub fn set(&self, pryv_username: &str, token: &str, answer: AccessCheck) {
        self.answers
            .lock()
            .unwrap()
            .insert((pryv_username.to_string(), token.to_string()), answer);
    }
}

#[async_trait::async_trait]
impl AccessVerifier for FakeVerifier {
    async fn check_access(&self, pryv_username: &str, token: &str) -> anyhow::Result<AccessCheck> {
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(&(pryv_username.to_string(), token.to_string()))
            .copied()
            .unwrap_or(AccessCheck::UnknownUser))
    }
}

pub fn sample_permission() -> Permission {
    Permission {
        stream_id: Some("heart".to_string()),
        tag: None,
        default_name: "Heart".to_string(),
        level: PermissionLevel::Read,
    }
}

pub struct TestContext {
    pub pool: AnyPool,
    pub clock: Arc<ManualClock>,
    pub verifier: Arc<FakeVerifier>,
    pub codec: TokenCodec,
    pub store: InvitationStore,
    pub user_repo: UserRepository,
    pub campaign_repo: CampaignRepository,
    pub accesses: AccessService,
    pub users: UserService,
    pub invitations: InvitationService,
    pub campaigns: CampaignService,
}

impl TestContext {
    pub async fn new() -> Self {
        let pool = memory_pool().await;
        let clock = Arc::new(ManualClock::new());
        let verifier = Arc::new(FakeVerifier::default());
        let codec = TokenCodec::new(TEST_SECRET.to_string());

        let store = InvitationStore::new(pool.clone());
        let user_repo = UserRepository::new(pool.clone());
        let campaign_repo = CampaignRepository::new(pool.clone());

        let accesses = AccessService::new(
            AccessRepository::new(pool.clone()),
            codec.clone(),
            clock.clone(),
            DEFAULT_ACCESS_TTL_SECONDS,
        );
        let users = UserService::new(user_repo.clone(), accesses.clone(), verifier.clone(), clock.clone())
            .with_hash_cost(4);
        let invitations = InvitationService::new(
            store.clone(),
            campaign_repo.clone(),
            user_repo.clone(),
            verifier.clone(),
            clock.clone(),
        );
        let campaigns = CampaignService::new(campaign_repo.clone(), invitations.clone(), clock.clone());

        Self {
            pool,
            clock,
            verifier,
            codec,
            store,
            user_repo,
            campaign_repo,
            accesses,
            users,
            invitations,
            campaigns,
        }
    }

    /// Stores a user with a local identity only. Returns its id.
    pub async fn local_user(&self, username: &str) -> String {
        let user = User::new(Some((username.to_string(), "unused-hash".to_string())), None, self.clock.now()).unwrap();
        assert!(self.user_repo.create(&user).await.unwrap());
        user.id
    }

    /// Stores a user with a Pryv identity only. Returns its id.
    pub async fn pryv_user(&self, pryv_username: &str) -> String {
        let user = User::new(None, Some(pryv_username.to_string()), self.clock.now()).unwrap();
        assert!(self.user_repo.create(&user).await.unwrap());
        user.id
    }

    /// Creates an active campaign owned by `creator_id`. Returns its id.
    pub async fn campaign(&self, creator_id: &str) -> String {
        self.campaigns
            .create(
                creator_id,
                NewCampaign {
                    title: "Study".to_string(),
                    description: "Test campaign".to_string(),
                    permissions: vec![sample_permission()],
                },
            )
            .await
            .unwrap()
            .id
    }

    /// Signs a bearer token for `user_id` the way login does.
    pub async fn bearer(&self, user_id: &str) -> String {
        format!("Bearer {}", self.accesses.open(user_id).await.unwrap().token)
    }
}
