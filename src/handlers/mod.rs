pub mod audio;

use crate::health;
use actix_web::web;

/// Every route the gateway serves. Shared by `main` and the handler tests.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/audio")
            .route("/upload", web::post().to(audio::upload_audio))
            .route("/download/{filename}", web::get().to(audio::download_audio))
            .route("/health", web::get().to(audio::downstream_health)),
    )
    .service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics)),
    )
    // Liveness of the gateway itself, independent of the processor
    .route("/health", web::get().to(health::health_check));
}
