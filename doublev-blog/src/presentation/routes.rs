use super::{http_handlers, middleware::admin_auth};
use crate::application::BlogServices;
use crate::infrastructure::jwt::JwtService;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;
use std::sync::Arc;

/// Registers shared state plus the admin and REST scopes, both behind bearer auth.
pub fn configure(
    cfg: &mut web::ServiceConfig,
    services: BlogServices,
    jwt_service: Arc<JwtService>,
    admin_prefix: &str,
) {
    let auth_middleware = HttpAuthentication::bearer(admin_auth);
    let admin_prefix = admin_prefix.trim_end_matches('/').to_string();

    cfg.app_data(web::Data::new(services))
        .app_data(web::Data::new(jwt_service))
        // Admin pages and actions
        .service(
            web::scope(&admin_prefix)
                .wrap(auth_middleware.clone())
                .route("/doublev_blog/post/index", web::get().to(http_handlers::post_index))
                .route("/doublev_blog/post/new", web::get().to(http_handlers::post_new))
                .route("/doublev_blog/post/edit", web::get().to(http_handlers::post_edit))
                .route("/doublev_blog/post/save", web::post().to(http_handlers::post_save))
                .route("/doublev_blog/post/delete", web::post().to(http_handlers::post_delete))
                .route(
                    "/doublev_blog/post/massdelete",
                    web::post().to(http_handlers::post_mass_delete),
                )
                .route(
                    "/doublev_blog/comment/index",
                    web::get().to(http_handlers::comment_index),
                ),
        )
        // Machine API
        .service(
            web::scope("/rest/V1/doublev_blog")
                .wrap(auth_middleware)
                .route("/posts/search", web::post().to(http_handlers::search_posts))
                .route("/posts", web::post().to(http_handlers::create_post))
                .route("/posts/{id}", web::get().to(http_handlers::get_post))
                .route("/posts/{id}", web::put().to(http_handlers::update_post))
                .route("/posts/{id}", web::delete().to(http_handlers::delete_post))
                .route("/posts/{id}/comments", web::get().to(http_handlers::post_comments))
                .route("/comments/search", web::post().to(http_handlers::search_comments))
                .route("/comments", web::post().to(http_handlers::create_comment))
                .route("/comments/{id}", web::get().to(http_handlers::get_comment))
                .route("/comments/{id}", web::delete().to(http_handlers::delete_comment)),
        );
}
