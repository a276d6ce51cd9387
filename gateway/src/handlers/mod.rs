pub mod notifications;
pub mod playback;
pub mod previews;
pub mod range;
pub mod uploads;
pub mod videos;

use actix_web::HttpResponse;

/// Health probe.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
}
