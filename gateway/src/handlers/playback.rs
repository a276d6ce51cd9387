/// Video playback - byte-range streaming from the media store
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::PgPool;
use tracing::warn;

use crate::cache::ViewCounter;
use crate::error::{AppError, Result};
use crate::handlers::range::{full_range, parse_range_header};
use crate::services::MediaStore;

/// Stream a finished video, honoring the `Range` request header.
///
/// A record that is still processing is indistinguishable from a missing
/// one (both 404). Every satisfied request counts one view, however small
/// the requested span.
pub async fn video_playback(
    req: HttpRequest,
    path: web::Path<String>,
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    counter: web::Data<ViewCounter>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if id.is_empty() {
        return Err(AppError::BadRequest("A video id is required".to_string()));
    }

    let video = crate::db::video_repo::find_by_reference(&pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Video does not exist".to_string()))?;

    if !video.available {
        return Err(AppError::NotFound("Video is not yet available".to_string()));
    }

    let size = video.size as u64;
    let range_header = req
        .headers()
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());

    let range = match range_header {
        Some(header) => parse_range_header(header, size),
        None => full_range(size),
    };

    let range = match range {
        Some(range) => range,
        None => {
            return Ok(HttpResponse::RangeNotSatisfiable()
                .insert_header((header::CONTENT_RANGE, format!("bytes */{size}")))
                .finish());
        }
    };

    let object = store
        .get_range(store.videos_bucket(), &id, range.start, range.end)
        .await
        .map_err(|e| AppError::StorageError(format!("{e:#}")))?;

    // The response does not depend on this write landing; it only has to
    // finish before the request does.
    if let Err(e) = counter.record_view(&id).await {
        warn!(reference = %id, error = %e, "View count update failed");
    }

    let content_type = object
        .content_type
        .clone()
        .unwrap_or_else(|| video.mimetype.clone());

    let mut response = if range_header.is_some() {
        HttpResponse::PartialContent()
    } else {
        HttpResponse::Ok()
    };

    Ok(response
        .insert_header((header::ACCEPT_RANGES, "bytes"))
        .insert_header((
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, size),
        ))
        .content_type(content_type)
        .no_chunking(range.length())
        .streaming(object.into_byte_stream()))
}
