use anyhow::anyhow;
use bcrypt::{hash, verify, DEFAULT_COST};
use common::time::Clock;
use common::{AppError, AppResult};
use std::sync::Arc;
use uuid::Uuid;

use crate::clients::AccessVerifier;
use crate::domain::{is_valid_pryv_username, AccessGrant, User, UserPublic};
use crate::repo::UserRepository;
use crate::service::{require_pryv_access, AccessService};

/// Identities supplied when creating an account.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: Option<String>,
    pub password: Option<String>,
    pub pryv_username: Option<String>,
    pub pryv_token: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    accesses: AccessService,
    verifier: Arc<dyn AccessVerifier>,
    clock: Arc<dyn Clock>,
    hash_cost: u32,
}

impl UserService {
    pub fn new(
        user_repo: UserRepository,
        accesses: AccessService,
        verifier: Arc<dyn AccessVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            user_repo,
            accesses,
            verifier,
            clock,
            hash_cost: DEFAULT_COST,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn register(&self, registration: Registration) -> AppResult<(UserPublic, AccessGrant)> {
        let local = match (registration.username, registration.password) {
            (Some(username), Some(password)) => {
                let hashed = hash(password, self.hash_cost)
                    .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
                Some((username, hashed))
            }
            (Some(_), None) => {
                return Err(AppError::InvalidRequestStructure("username requires a password".to_string()))
            }
            (None, Some(_)) => {
                return Err(AppError::InvalidRequestStructure("password requires a username".to_string()))
            }
            (None, None) => None,
        };

        if let Some(pryv_username) = &registration.pryv_username {
            check_pryv_username(pryv_username)?;
            let token = registration.pryv_token.as_deref().ok_or_else(|| {
                AppError::InvalidRequestStructure("pryvUsername requires a pryvToken".to_string())
            })?;
            require_pryv_access(self.verifier.as_ref(), pryv_username, token).await?;
        }

        let user = User::new(local, registration.pryv_username, self.clock.now()).ok_or_else(|| {
            AppError::InvalidRequestStructure("a username or a pryvUsername is required".to_string())
        })?;

        if !self.user_repo.create(&user).await? {
            return Err(AppError::invalid_operation("Username or Pryv username is already registered"));
        }
        tracing::info!("Registered user {}", user.id);

        let grant = self.accesses.open(&user.id).await?;
        Ok((UserPublic::from(user), grant))
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> AppResult<(UserPublic, AccessGrant)> {
        let user = self
            .user_repo
            .find_by_username(username)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let stored_hash = user.password_hash.as_deref().ok_or(AppError::InvalidCredentials)?;
        let password_match = verify(password, stored_hash)
            .map_err(|e| anyhow!("Password verification failed: {}", e))?;
        if !password_match {
            return Err(AppError::InvalidCredentials);
        }

        let grant = self.accesses.open(&user.id).await?;
        Ok((UserPublic::from(user), grant))
    }

    pub async fn sign_out(&self, access_id: &str) -> AppResult<()> {
        self.accesses.revoke(access_id).await
    }

    pub async fn get(&self, id: &str) -> AppResult<UserPublic> {
        self.user_repo
            .find_by_id(id)
            .await?
            .map(UserPublic::from)
            .ok_or_else(|| AppError::UnknownResource(format!("Unknown user {}", id)))
    }

    /// Adds a Pryv identity to an account that only has a local one.
    pub async fn link_pryv(&self, id: &str, pryv_username: &str, pryv_token: &str) -> AppResult<UserPublic> {
        let user = self
            .user_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UnknownResource(format!("Unknown user {}", id)))?;
        if user.pryv_username.is_some() {
            return Err(AppError::invalid_operation_on("User is already linked to Pryv", id));
        }
        check_pryv_username(pryv_username)?;

        require_pryv_access(self.verifier.as_ref(), pryv_username, pryv_token).await?;

        let pryv_id = Uuid::new_v4().to_string();
        if !self.user_repo.link_pryv(id, pryv_username, &pryv_id).await? {
            return Err(AppError::invalid_operation("Pryv username is already registered"));
        }
        tracing::info!("Linked user {} to Pryv user {}", id, pryv_username);

        self.get(id).await
    }
}

fn check_pryv_username(pryv_username: &str) -> AppResult<()> {
    if is_valid_pryv_username(pryv_username) {
        Ok(())
    } else {
        Err(AppError::InvalidRequestStructure(format!(
            "pryvUsername {:?} may only contain lowercase letters, digits and '-'",
            pryv_username
        )))
    }
}
