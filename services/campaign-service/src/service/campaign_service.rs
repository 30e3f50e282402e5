use common::time::Clock;
use common::{AppError, AppResult};
use std::sync::Arc;

use crate::domain::{Campaign, Permission};
use crate::repo::CampaignRepository;
use crate::service::InvitationService;

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub title: String,
    pub description: String,
    pub permissions: Vec<Permission>,
}

#[derive(Clone)]
pub struct CampaignService {
    repo: CampaignRepository,
    invitations: InvitationService,
    clock: Arc<dyn Clock>,
}

impl CampaignService {
    pub fn new(repo: CampaignRepository, invitations: InvitationService, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            invitations,
            clock,
        }
    }

    pub async fn create(&self, creator_id: &str, new: NewCampaign) -> AppResult<Campaign> {
        if new.permissions.is_empty() {
            return Err(AppError::InvalidRequestStructure(
                "a campaign needs at least one permission".to_string(),
            ));
        }
        for permission in &new.permissions {
            permission.check().map_err(AppError::InvalidRequestStructure)?;
        }

        let campaign = Campaign::new(
            new.title,
            new.description,
            new.permissions,
            creator_id.to_string(),
            self.clock.now(),
        );
        self.repo.create(&campaign).await?;
        tracing::info!("Created campaign {} by {}", campaign.id, creator_id);

        Ok(campaign)
    }

    pub async fn get(&self, id: &str) -> AppResult<Campaign> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UnknownResource(format!("Unknown campaign {}", id)))
    }

    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Campaign>> {
        Ok(self.repo.list_by_creator(user_id).await?)
    }

    /// Cancels the campaign, then every open invitation it has. Calling it
    /// again on a cancelled campaign finishes an interrupted cascade.
    pub async fn cancel(&self, id: &str, actor_id: &str) -> AppResult<Campaign> {
        let campaign = self.get(id).await?;
        if campaign.creator_id != actor_id {
            return Err(AppError::Forbidden("Only the creator can cancel a campaign".to_string()));
        }

        if campaign.is_active() {
            // Flipped first so no invitation can be opened behind the cascade.
            self.repo.cancel(id, self.clock.now()).await?;
        } else if self.invitations.open_count_for_campaign(id).await? == 0 {
            return Err(AppError::invalid_operation_on("Campaign is already cancelled", id));
        } else {
            tracing::warn!("Campaign {} is cancelled with open invitations, resuming cascade", id);
        }

        let cancelled = self.invitations.cancel_for_campaign(id).await?;
        tracing::info!("Cancelled campaign {} and {} invitation(s)", id, cancelled);

        self.get(id).await
    }
}
