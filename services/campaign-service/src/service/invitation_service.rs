use common::time::Clock;
use common::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::AccessVerifier;
use crate::domain::{validate_transition, Invitation, InvitationView, TransitionRequest, UserRef};
use crate::repo::{CampaignRepository, InvitationStore, StoreError, UserRepository};
use crate::service::require_pryv_access;

/// Attempts at load-validate-append before giving up on a contended invitation.
const MAX_APPEND_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct InvitationService {
    store: InvitationStore,
    campaign_repo: CampaignRepository,
    user_repo: UserRepository,
    verifier: Arc<dyn AccessVerifier>,
    clock: Arc<dyn Clock>,
}

impl InvitationService {
    pub fn new(
        store: InvitationStore,
        campaign_repo: CampaignRepository,
        user_repo: UserRepository,
        verifier: Arc<dyn AccessVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            campaign_repo,
            user_repo,
            verifier,
            clock,
        }
    }

    pub async fn create(
        &self,
        campaign_id: &str,
        requestee: &UserRef,
        requester_id: &str,
        access_token: Option<String>,
    ) -> AppResult<Invitation> {
        let campaign = self
            .campaign_repo
            .find_by_id(campaign_id)
            .await?
            .ok_or_else(|| AppError::UnknownResource(format!("Unknown campaign {}", campaign_id)))?;
        if !campaign.is_active() {
            return Err(AppError::invalid_operation_on("Campaign is cancelled", campaign.id));
        }

        let requestee = self
            .user_repo
            .find(requestee)
            .await?
            .ok_or_else(|| AppError::invalid_operation(format!("Unknown requestee with {}", requestee)))?;

        // Refused or cancelled invitations do not block a new one.
        let current = self.store.live_for_requestee(&requestee.id).await?;
        if let Some(existing) = current
            .iter()
            .find(|i| i.campaign_id == campaign.id && !i.status.is_terminal())
        {
            return Err(AppError::invalid_operation_on(
                format!("Requestee already has a {} invitation for this campaign", existing.status),
                existing.id.clone(),
            ));
        }

        let invitation = Invitation::new(
            campaign.id,
            requester_id.to_string(),
            requestee.id,
            access_token,
            self.clock.now(),
        );
        self.store.insert(&invitation).await?;

        info!(
            "Created invitation {} for campaign {} ({} -> {})",
            invitation.id, invitation.campaign_id, invitation.requester_id, invitation.requestee_id
        );
        Ok(invitation)
    }

    /// Applies `request` to the live version of invitation `id` and returns
    /// the version that replaced it.
    pub async fn transition(&self, id: &str, request: TransitionRequest) -> AppResult<Invitation> {
        let target = request.target();

        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            let current = self.live(id).await?;
            validate_transition(current.status, target)
                .map_err(|e| AppError::invalid_operation_on(e.to_string(), current.id.clone()))?;

            let access_token = match &request {
                TransitionRequest::Accept {
                    access_token: Some(token),
                } => {
                    self.check_requestee_access(&current, token).await?;
                    Some(token.clone())
                }
                _ => None,
            };

            let next = current.next_version(target, access_token, self.clock.now());
            match self.store.append_version(id, current.version, &next).await {
                Ok(()) => {
                    info!(
                        "Invitation {} moved {} -> {} (version {})",
                        id, current.status, next.status, next.version
                    );
                    return Ok(next);
                }
                Err(StoreError::StaleVersion { .. }) => {
                    warn!("Invitation {} changed under attempt {}, reloading", id, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::invalid_operation_on(
            "Invitation is being modified concurrently, try again",
            id,
        ))
    }

    /// Like [`transition`](Self::transition), for the requestee answering
    /// their own invitation.
    pub async fn respond(&self, id: &str, user_id: &str, request: TransitionRequest) -> AppResult<Invitation> {
        let current = self.live(id).await?;
        if current.requestee_id != user_id {
            return Err(AppError::Forbidden("Only the requestee can answer an invitation".to_string()));
        }
        self.transition(id, request).await
    }

    pub async fn get(&self, id: &str) -> AppResult<InvitationView> {
        let versions = self.store.get_versions(id).await?;
        InvitationView::from_versions(versions)
            .ok_or_else(|| AppError::UnknownResource(format!("Unknown invitation {}", id)))
    }

    /// Like [`get`](Self::get), restricted to the requester and requestee.
    pub async fn get_for_party(&self, id: &str, user_id: &str) -> AppResult<InvitationView> {
        let view = self.get(id).await?;
        if !view.latest.involves(user_id) {
            return Err(AppError::Forbidden("Not a party to this invitation".to_string()));
        }
        Ok(view)
    }

    /// Every invitation the user takes part in, most recently modified first,
    /// each with its superseded versions as history.
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<InvitationView>> {
        let records = self.store.get_history_for_user(user_id).await?;

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Invitation>> = HashMap::new();
        for record in records {
            let group = groups.entry(record.id.clone()).or_insert_with(|| {
                order.push(record.id.clone());
                Vec::new()
            });
            group.push(record);
        }

        Ok(order
            .into_iter()
            .filter_map(|id| groups.remove(&id))
            .filter_map(InvitationView::from_versions)
            .collect())
    }

    /// Cancels every open invitation of a campaign. Returns how many moved.
    pub async fn cancel_for_campaign(&self, campaign_id: &str) -> AppResult<usize> {
        let live = self.store.live_for_campaign(campaign_id).await?;
        let mut cancelled = 0;

        for invitation in live.iter().filter(|i| !i.status.is_terminal()) {
            match self.transition(&invitation.id, TransitionRequest::Cancel).await {
                Ok(_) => cancelled += 1,
                Err(err @ AppError::InvalidOperation { .. }) => {
                    // Refused meanwhile it stays refused; anything else is left for a retry.
                    if !self.live(&invitation.id).await?.status.is_terminal() {
                        return Err(err);
                    }
                    warn!("Invitation {} ended before it could be cancelled, skipping", invitation.id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(cancelled)
    }

    pub async fn open_count_for_campaign(&self, campaign_id: &str) -> AppResult<usize> {
        let live = self.store.live_for_campaign(campaign_id).await?;
        Ok(live.iter().filter(|i| !i.status.is_terminal()).count())
    }

    async fn live(&self, id: &str) -> AppResult<Invitation> {
        self.store
            .get_latest(id)
            .await?
            .ok_or_else(|| AppError::UnknownResource(format!("Unknown invitation {}", id)))
    }

    async fn check_requestee_access(&self, invitation: &Invitation, token: &str) -> AppResult<()> {
        let requestee = self
            .user_repo
            .find_by_id(&invitation.requestee_id)
            .await?
            .ok_or_else(|| AppError::UnknownResource(format!("Unknown user {}", invitation.requestee_id)))?;

        let pryv_username = requestee.pryv_username.as_deref().ok_or_else(|| {
            AppError::invalid_operation_on("Requestee has no Pryv account to check the access token against", invitation.id.clone())
        })?;

        require_pryv_access(self.verifier.as_ref(), pryv_username, token).await
    }
}
