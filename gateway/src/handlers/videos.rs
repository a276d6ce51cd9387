/// Video catalog handlers - listing, detail, deletion
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::cache::ViewCounter;
use crate::db::video_repo;
use crate::error::{AppError, Result};
use crate::models::{Video, VideoListResponse, VideoResponse};
use crate::services::MediaStore;

/// Merge cached view counts into a set of records, substituting 0 when the
/// cache cannot answer.
async fn merge_views(counter: &ViewCounter, videos: Vec<Video>) -> Vec<VideoResponse> {
    let references: Vec<String> = videos.iter().map(|v| v.reference.clone()).collect();
    let views = match counter.get_many(&references).await {
        Ok(views) => views,
        Err(e) => {
            warn!(error = %e, "View count lookup failed, reporting zeros");
            vec![0; videos.len()]
        }
    };

    videos
        .into_iter()
        .zip(views)
        .map(|(video, views)| VideoResponse::new(video, views))
        .collect()
}

/// List all available videos, stamped with a fresh catch-up token.
pub async fn list_videos(
    pool: web::Data<PgPool>,
    counter: web::Data<ViewCounter>,
) -> Result<HttpResponse> {
    let videos = video_repo::list_available(&pool).await?;
    let videos = merge_views(&counter, videos).await;

    // The token lets the client resume live updates from this moment.
    let token = Utc::now().timestamp_millis().to_string();

    Ok(HttpResponse::Ok().json(VideoListResponse { token, videos }))
}

/// Get a single video by id.
pub async fn get_video(
    path: web::Path<String>,
    pool: web::Data<PgPool>,
    counter: web::Data<ViewCounter>,
) -> Result<HttpResponse> {
    let id = path.into_inner();

    let video = video_repo::find_by_reference(&pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Video does not exist".to_string()))?;

    let views = match counter.get(&video.reference).await {
        Ok(views) => views,
        Err(e) => {
            warn!(reference = %id, error = %e, "View count lookup failed, reporting zero");
            0
        }
    };

    Ok(HttpResponse::Ok().json(VideoResponse::new(video, views)))
}

/// Delete a video: its store objects, its view counter, then the record.
pub async fn delete_video(
    path: web::Path<String>,
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    counter: web::Data<ViewCounter>,
) -> Result<HttpResponse> {
    let id = path.into_inner();

    let video = video_repo::find_by_reference(&pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Video does not exist".to_string()))?;

    store
        .delete(store.videos_bucket(), &video.reference)
        .await
        .map_err(|e| AppError::StorageError(format!("{e:#}")))?;

    for preview in &video.previews {
        store
            .delete(store.previews_bucket(), preview)
            .await
            .map_err(|e| AppError::StorageError(format!("{e:#}")))?;
    }

    counter.delete(&video.reference).await?;
    video_repo::delete_by_reference(&pool, &video.reference).await?;

    info!(reference = %video.reference, "Video deleted");

    Ok(HttpResponse::NoContent().finish())
}
