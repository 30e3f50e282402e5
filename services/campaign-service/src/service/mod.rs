pub mod access_service;
pub mod campaign_service;
pub mod invitation_service;
pub mod user_service;

pub use access_service::AccessService;
pub use campaign_service::{CampaignService, NewCampaign};
pub use invitation_service::InvitationService;
pub use user_service::{Registration, UserService};

use common::AppError;

use crate::clients::{AccessCheck, AccessVerifier};
use crate::repo::StoreError;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateId(id) => AppError::invalid_operation_on("Invitation already exists", id),
            StoreError::StaleVersion { id, .. } => {
                AppError::invalid_operation_on("Invitation was modified concurrently", id)
            }
            StoreError::AlreadyOpen(id) => {
                AppError::invalid_operation_on("Requestee already has an open invitation for this campaign", id)
            }
            StoreError::NotFound(id) => AppError::UnknownResource(format!("Unknown invitation {}", id)),
            other => AppError::Internal(other.into()),
        }
    }
}

/// Fails unless Pryv confirms `token` is a live access of `pryv_username`.
pub(crate) async fn require_pryv_access(
    verifier: &dyn AccessVerifier,
    pryv_username: &str,
    token: &str,
) -> Result<(), AppError> {
    match verifier.check_access(pryv_username, token).await? {
        AccessCheck::Valid => Ok(()),
        AccessCheck::Invalid => Err(AppError::Forbidden(format!(
            "Access token is not valid for Pryv user {}",
            pryv_username
        ))),
        AccessCheck::UnknownUser => Err(AppError::UnknownResource(format!(
            "Unknown Pryv user {}",
            pryv_username
        ))),
    }
}
