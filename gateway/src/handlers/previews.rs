/// Preview images - served straight from the media store
use actix_web::{web, HttpResponse};

use crate::error::{AppError, Result};
use crate::services::storage::error_is_not_found;
use crate::services::MediaStore;

/// Stream one preview image. Previews are store-addressed: no catalog
/// lookup, no view counting; a missing key surfaces as the store's 404.
pub async fn get_preview(
    path: web::Path<String>,
    store: web::Data<MediaStore>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if id.is_empty() {
        return Err(AppError::BadRequest("A preview id is required".to_string()));
    }

    let object = store
        .get(store.previews_bucket(), &id)
        .await
        .map_err(|e| {
            if error_is_not_found(&e) {
                AppError::NotFound("Preview does not exist".to_string())
            } else {
                AppError::StorageError(format!("{e:#}"))
            }
        })?;

    Ok(HttpResponse::Ok()
        .content_type("image/png")
        .streaming(object.into_byte_stream()))
}
