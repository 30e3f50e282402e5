use actix_web::web;
use authz::AuthMiddleware;
use common::errors::{json_error_handler, path_error_handler, query_error_handler};
use super::handlers;

pub fn configure(cfg: &mut web::ServiceConfig, auth: AuthMiddleware) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .route("/health", web::get().to(handlers::health_check))
        // Public, registered ahead of the guarded scope
        .route("/api/users", web::post().to(handlers::register))
        .route("/api/auth/login", web::post().to(handlers::login))
        .service(
            web::scope("/api")
                .wrap(auth)
                .route("/auth/logout", web::post().to(handlers::logout))
                .service(
                    web::scope("/users")
                        .route("/{id}", web::get().to(handlers::get_user))
                        .route("/{id}/pryv", web::post().to(handlers::link_pryv)),
                )
                .service(
                    web::scope("/campaigns")
                        .route("", web::post().to(handlers::create_campaign))
                        .route("", web::get().to(handlers::list_campaigns))
                        .route("/{id}", web::get().to(handlers::get_campaign))
                        .route("/{id}/cancel", web::post().to(handlers::cancel_campaign)),
                )
                .service(
                    web::scope("/invitations")
                        .route("", web::post().to(handlers::create_invitation))
                        .route("", web::get().to(handlers::list_invitations))
                        .route("/{id}", web::get().to(handlers::get_invitation))
                        .route("/{id}/seen", web::post().to(handlers::mark_seen))
                        .route("/{id}/accept", web::post().to(handlers::accept))
                        .route("/{id}/refuse", web::post().to(handlers::refuse)),
                ),
        );
}
