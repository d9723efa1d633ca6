//! HTTP handlers and route configuration.

mod health;
mod posts;

use actix_web::web;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Public routes
            .route("/health", web::get().to(health::health_check))
            // Posts
            .service(
                web::scope("/posts")
                    .route("", web::get().to(posts::list_posts))
                    .route("", web::post().to(posts::create_post))
                    .route("/{id}", web::get().to(posts::get_post))
                    .route("/{id}", web::patch().to(posts::update_post))
                    .route("/{id}", web::delete().to(posts::delete_post))
                    .route("/{id}/publish", web::post().to(posts::publish_now))
                    .route("/{id}/schedule", web::post().to(posts::schedule_post))
                    .route("/{id}/schedule", web::delete().to(posts::cancel_schedule))
                    .route("/{id}/status", web::get().to(posts::post_status)),
            ),
    );
}
