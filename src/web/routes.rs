use actix_web::web;
use crate::web::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/chat", web::post().to(handlers::chat))
            .route("/chat/quick-questions", web::get().to(handlers::quick_questions))
            .route("/chat/{id}", web::get().to(handlers::session_state))
            .route("/chat/{id}", web::delete().to(handlers::clear_history))
            .route("/chat/{id}/draft", web::put().to(handlers::update_draft))
            .route("/water", web::get().to(handlers::search_water))
            .route("/water/{city}", web::get().to(handlers::city_water))
            .route("/i18n/{lang}", web::get().to(handlers::translation_table))
            .route("/i18n/{lang}/{key}", web::get().to(handlers::translate))
    )
    .route("/", web::get().to(handlers::index))
    .route("/health", web::get().to(handlers::health_check));
}
