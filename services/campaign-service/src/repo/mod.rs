pub mod access_repo;
pub mod campaign_repo;
pub mod invitation_store;
pub mod user_repo;

pub use access_repo::AccessRepository;
pub use campaign_repo::CampaignRepository;
pub use invitation_store::{InvitationStore, StoreError};
pub use user_repo::UserRepository;

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
