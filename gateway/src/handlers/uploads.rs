/// Upload handling - multipart intake for new videos
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures::StreamExt;
use sqlx::PgPool;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::db::video_repo;
use crate::error::{AppError, Result};
use crate::kafka::JobQueue;
use crate::models::{self, ProcessingJob, VideoResponse};
use crate::services::MediaStore;

const DEFAULT_TITLE: &str = "Untitled";
const MAX_TITLE_BYTES: usize = 1024;

/// Accept one video file, register the pending record, and hand the work to
/// the external worker.
///
/// Ordering matters: the store write completes before the catalog insert,
/// and the record exists before the job is published, so the completion
/// consumer can never race ahead of record creation.
pub async fn upload_video(
    mut payload: Multipart,
    pool: web::Data<PgPool>,
    store: web::Data<MediaStore>,
    queue: web::Data<JobQueue>,
    config: web::Data<Config>,
) -> Result<HttpResponse> {
    let mut title: Option<String> = None;
    let mut uploaded: Option<(String, String, i64)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item
            .map_err(|e| AppError::BadRequest(format!("Couldn't process the file: {e}")))?;

        let is_file = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .is_some();

        if !is_file {
            if field.name() == Some("title") {
                title = Some(read_text_field(&mut field).await?);
            } else {
                drain_field(&mut field).await;
            }
            continue;
        }

        // Single-file endpoint; extra file parts are drained and ignored.
        if uploaded.is_some() {
            drain_field(&mut field).await;
            continue;
        }

        let mimetype = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_default();

        if !models::is_accepted_mime(&mimetype) {
            return Err(AppError::BadRequest(
                "Provided file's mimetype is not supported".to_string(),
            ));
        }

        let reference = models::new_reference();
        let max_bytes = config.upload.max_file_size_bytes;
        let seen = Arc::new(AtomicI64::new(0));

        let seen_in_stream = seen.clone();
        let limited = field.map(move |chunk| match chunk {
            Ok(bytes) => {
                let total = seen_in_stream.fetch_add(bytes.len() as i64, Ordering::Relaxed)
                    + bytes.len() as i64;
                if total > max_bytes {
                    Err("upload exceeds the configured size limit".to_string())
                } else {
                    Ok(bytes)
                }
            }
            Err(e) => Err(e.to_string()),
        });

        let size = match store
            .upload_stream(store.videos_bucket(), &reference, &mimetype, limited)
            .await
        {
            Ok(size) => size,
            Err(_) if seen.load(Ordering::Relaxed) > max_bytes => {
                return Err(AppError::PayloadTooLarge(format!(
                    "Upload exceeds the {max_bytes} byte limit"
                )));
            }
            Err(e) => return Err(AppError::StorageError(format!("{e:#}"))),
        };

        uploaded = Some((reference, mimetype, size));
    }

    let (reference, mimetype, size) = uploaded.ok_or_else(|| {
        AppError::BadRequest("Couldn't process the file successfully".to_string())
    })?;

    let video = video_repo::create_video(
        &pool,
        &reference,
        title.as_deref().unwrap_or(DEFAULT_TITLE),
        &mimetype,
        size,
    )
    .await?;

    queue
        .publish_job(&ProcessingJob {
            reference: video.reference.clone(),
            mimetype: video.mimetype.clone(),
        })
        .await
        .map_err(|e| AppError::QueueError(format!("{e:#}")))?;

    info!(reference = %video.reference, size, mimetype = %video.mimetype, "Upload accepted");

    Ok(HttpResponse::Ok().json(VideoResponse::new(video, 0)))
}

async fn read_text_field(field: &mut Field) -> Result<String> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk =
            chunk.map_err(|e| AppError::BadRequest(format!("Couldn't read the field: {e}")))?;
        data.extend_from_slice(&chunk);
        if data.len() > MAX_TITLE_BYTES {
            return Err(AppError::BadRequest("Title is too long".to_string()));
        }
    }
    String::from_utf8(data).map_err(|_| AppError::BadRequest("Title must be UTF-8".to_string()))
}

async fn drain_field(field: &mut Field) {
    while field.next().await.is_some() {}
}
