use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use common::AppError;
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use crate::jwt::TokenCodec;

/// Answers whether a stored access is still usable (not revoked, not expired).
#[async_trait::async_trait]
pub trait AccessLookup: Send + Sync {
    async fn is_access_valid(&self, access_id: &str) -> anyhow::Result<bool>;
}

pub struct AuthMiddleware {
    codec: TokenCodec,
    lookup: Arc<dyn AccessLookup>,
}

impl AuthMiddleware {
    pub fn new(codec: TokenCodec, lookup: Arc<dyn AccessLookup>) -> Self {
        Self { codec, lookup }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            codec: self.codec.clone(),
            lookup: self.lookup.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    codec: TokenCodec,
    lookup: Arc<dyn AccessLookup>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = match bearer_token(&req) {
            Ok(token) => token,
            Err(e) => {
                let err: Error = e.into();
                return Box::pin(async move { Err(err) });
            }
        };

        let claims = match self.codec.verify_token(&token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!("Rejected bearer token: {}", e);
                let err: Error = AppError::Forbidden("Invalid or expired access token".to_string()).into();
                return Box::pin(async move { Err(err) });
            }
        };

        let service = self.service.clone();
        let lookup = self.lookup.clone();

        Box::pin(async move {
            // Signature and exp are fine; the access may still have been revoked.
            if !lookup.is_access_valid(&claims.access_id).await.map_err(AppError::Internal)? {
                return Err(AppError::Forbidden("Access has been revoked or has expired".to_string()).into());
            }

            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Result<String, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Forbidden("Missing authorization header".to_string()))?;

    let header_str = header
        .to_str()
        .map_err(|_| AppError::Forbidden("Invalid authorization header".to_string()))?;

    header_str
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or_else(|| AppError::Forbidden("Invalid authorization format".to_string()))
}
