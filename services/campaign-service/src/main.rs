mod api;
mod clients;
mod domain;
mod repo;
mod service;
#[cfg(test)]
mod test_support;

use actix_web::{middleware::Logger, web, App, HttpServer};
use authz::{AccessLookup, AuthMiddleware, TokenCodec};
use clients::{AccessVerifier, PryvClient};
use common::config::AppConfig;
use common::time::{Clock, SystemClock};
use repo::{AccessRepository, CampaignRepository, InvitationStore, UserRepository};
use service::{AccessService, CampaignService, InvitationService, UserService};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set, using development secret (INSECURE for production!)");
    }

    let backend = db::Backend::from_url(&config.database_url)?;
    let pool = db::create_pool(&config.database_url).await?;
    db::migrate(&pool, backend).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let verifier: Arc<dyn AccessVerifier> = Arc::new(PryvClient::new(config.pryv_domain.clone()));
    let codec = TokenCodec::new(config.jwt_secret.clone());

    // Initialize repositories and services
    let user_repo = UserRepository::new(pool.clone());
    let campaign_repo = CampaignRepository::new(pool.clone());
    let access_service = AccessService::new(
        AccessRepository::new(pool.clone()),
        codec.clone(),
        clock.clone(),
        config.access_ttl_seconds,
    );
    let user_service = UserService::new(user_repo.clone(), access_service.clone(), verifier.clone(), clock.clone());
    let invitation_service = InvitationService::new(
        InvitationStore::new(pool.clone()),
        campaign_repo.clone(),
        user_repo,
        verifier,
        clock.clone(),
    );
    let campaign_service = CampaignService::new(campaign_repo, invitation_service.clone(), clock);
    let lookup: Arc<dyn AccessLookup> = Arc::new(access_service);

    let server_address = config.server_address();
    tracing::info!("{} starting on http://{} ({:?})", config.service_name, server_address, backend);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(campaign_service.clone()))
            .app_data(web::Data::new(invitation_service.clone()))
            .configure(|cfg| api::routes::configure(cfg, AuthMiddleware::new(codec.clone(), lookup.clone())))
    })
    .bind(&server_address)?
    .run()
    .await?;

    Ok(())
}
