use actix_web::{web, HttpResponse};
use authz::Claims;
use common::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sqlx::AnyPool;
use validator::Validate;

use crate::domain::{AccessGrant, Permission, TransitionRequest, UserPublic, UserRef};
use crate::service::{CampaignService, InvitationService, NewCampaign, Registration, UserService};

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,
    #[validate(length(min = 6))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub pryv_username: Option<String>,
    pub pryv_token: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LinkPryvRequest {
    #[validate(length(min = 1, max = 64))]
    pub pryv_username: String,
    #[validate(length(min = 1))]
    pub pryv_token: String,
}

#[derive(Deserialize, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 4096))]
    pub description: String,
    #[validate(length(min = 1))]
    pub permissions: Vec<Permission>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    #[validate(length(min = 1))]
    pub campaign_id: String,
    pub requestee: UserRef,
    pub access_token: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequest {
    pub access_token: Option<String>,
}

#[derive(Deserialize)]
pub struct UserQuery {
    pub user: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserPublic,
    pub access: AccessGrant,
}

pub async fn health_check(pool: web::Data<AnyPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
        })),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unavailable",
                "service": env!("CARGO_PKG_NAME"),
            }))
        }
    }
}

pub async fn register(
    users: web::Data<UserService>,
    request: web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    request.validate()?;
    let request = request.into_inner();

    let (user, access) = users
        .register(Registration {
            username: request.username,
            password: request.password,
            pryv_username: request.pryv_username,
            pryv_token: request.pryv_token,
        })
        .await?;

    Ok(HttpResponse::Created().json(AuthResponse { user, access }))
}

pub async fn login(
    users: web::Data<UserService>,
    request: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    request.validate()?;
    let (user, access) = users.sign_in(&request.username, &request.password).await?;
    Ok(HttpResponse::Ok().json(AuthResponse { user, access }))
}

pub async fn logout(claims: web::ReqData<Claims>, users: web::Data<UserService>) -> AppResult<HttpResponse> {
    users.sign_out(&claims.access_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn get_user(
    _claims: web::ReqData<Claims>,
    users: web::Data<UserService>,
    user_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let user = users.get(&user_id).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn link_pryv(
    claims: web::ReqData<Claims>,
    users: web::Data<UserService>,
    user_id: web::Path<String>,
    request: web::Json<LinkPryvRequest>,
) -> AppResult<HttpResponse> {
    if claims.sub != *user_id {
        return Err(AppError::Forbidden("Cannot link another user's account".to_string()));
    }
    request.validate()?;

    let user = users
        .link_pryv(&user_id, &request.pryv_username, &request.pryv_token)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn create_campaign(
    claims: web::ReqData<Claims>,
    campaigns: web::Data<CampaignService>,
    request: web::Json<CreateCampaignRequest>,
) -> AppResult<HttpResponse> {
    request.validate()?;
    let request = request.into_inner();

    let campaign = campaigns
        .create(
            &claims.sub,
            NewCampaign {
                title: request.title,
                description: request.description,
                permissions: request.permissions,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(campaign))
}

pub async fn list_campaigns(
    _claims: web::ReqData<Claims>,
    campaigns: web::Data<CampaignService>,
    query: web::Query<UserQuery>,
) -> AppResult<HttpResponse> {
    let list = campaigns.list_for_user(&query.user).await?;
    Ok(HttpResponse::Ok().json(list))
}

pub async fn get_campaign(
    _claims: web::ReqData<Claims>,
    campaigns: web::Data<CampaignService>,
    campaign_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let campaign = campaigns.get(&campaign_id).await?;
    Ok(HttpResponse::Ok().json(campaign))
}

pub async fn cancel_campaign(
    claims: web::ReqData<Claims>,
    campaigns: web::Data<CampaignService>,
    campaign_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let campaign = campaigns.cancel(&campaign_id, &claims.sub).await?;
    Ok(HttpResponse::Ok().json(campaign))
}

pub async fn create_invitation(
    claims: web::ReqData<Claims>,
    invitations: web::Data<InvitationService>,
    request: web::Json<CreateInvitationRequest>,
) -> AppResult<HttpResponse> {
    request.validate()?;
    let request = request.into_inner();

    let invitation = invitations
        .create(&request.campaign_id, &request.requestee, &claims.sub, request.access_token)
        .await?;
    Ok(HttpResponse::Created().json(invitation))
}

pub async fn list_invitations(
    claims: web::ReqData<Claims>,
    invitations: web::Data<InvitationService>,
    query: web::Query<UserQuery>,
) -> AppResult<HttpResponse> {
    if claims.sub != query.user {
        return Err(AppError::Forbidden("Cannot list another user's invitations".to_string()));
    }
    let list = invitations.list_for_user(&query.user).await?;
    Ok(HttpResponse::Ok().json(list))
}

pub async fn get_invitation(
    claims: web::ReqData<Claims>,
    invitations: web::Data<InvitationService>,
    invitation_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let view = invitations.get_for_party(&invitation_id, &claims.sub).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn mark_seen(
    claims: web::ReqData<Claims>,
    invitations: web::Data<InvitationService>,
    invitation_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let invitation = invitations
        .respond(&invitation_id, &claims.sub, TransitionRequest::Seen)
        .await?;
    Ok(HttpResponse::Ok().json(invitation))
}

pub async fn accept(
    claims: web::ReqData<Claims>,
    invitations: web::Data<InvitationService>,
    invitation_id: web::Path<String>,
    request: Option<web::Json<AcceptRequest>>,
) -> AppResult<HttpResponse> {
    let request = request.map(web::Json::into_inner).unwrap_or_default();
    let invitation = invitations
        .respond(
            &invitation_id,
            &claims.sub,
            TransitionRequest::Accept {
                access_token: request.access_token,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(invitation))
}

pub async fn refuse(
    claims: web::ReqData<Claims>,
    invitations: web::Data<InvitationService>,
    invitation_id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let invitation = invitations
        .respond(&invitation_id, &claims.sub, TransitionRequest::Refuse)
        .await?;
    Ok(HttpResponse::Ok().json(invitation))
}
