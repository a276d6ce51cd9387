/// Video catalog repository
///
/// Every mutation bumps `updated_at`; the catch-up push relies on it.
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::Video;

const VIDEO_COLUMNS: &str = "id, reference, title, mimetype, size, available, \
     duration, step, previews, thumbnail, created_at, updated_at";

/// Insert a pending record for a freshly uploaded file.
pub async fn create_video(
    pool: &PgPool,
    reference: &str,
    title: &str,
    mimetype: &str,
    size: i64,
) -> Result<Video> {
    let video = sqlx::query_as::<_, Video>(&format!(
        "INSERT INTO videos (reference, title, mimetype, size) \
         VALUES ($1, $2, $3, $4) \
         RETURNING {VIDEO_COLUMNS}"
    ))
    .bind(reference)
    .bind(title)
    .bind(mimetype)
    .bind(size)
    .fetch_one(pool)
    .await?;

    Ok(video)
}

/// Find one record by its client-facing reference.
pub async fn find_by_reference(pool: &PgPool, reference: &str) -> Result<Option<Video>> {
    let video = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE reference = $1"
    ))
    .bind(reference)
    .fetch_optional(pool)
    .await?;

    Ok(video)
}

/// List records that finished processing, newest first.
pub async fn list_available(pool: &PgPool) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE available = TRUE \
         ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(videos)
}

/// List records mutated strictly after `since` (catch-up query).
pub async fn list_updated_since(pool: &PgPool, since: DateTime<Utc>) -> Result<Vec<Video>> {
    let videos = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE updated_at > $1 \
         ORDER BY updated_at ASC"
    ))
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(videos)
}

/// Apply a completion event: full overwrite of the completion fields, so a
/// redelivered event converges on the same final state. Returns `None` when
/// no record carries the reference (catalog/queue desynchronization).
pub async fn apply_completion(
    pool: &PgPool,
    reference: &str,
    duration: i32,
    step: i32,
    previews: &[String],
    thumbnail: &str,
) -> Result<Option<Video>> {
    let video = sqlx::query_as::<_, Video>(&format!(
        "UPDATE videos \
         SET available = TRUE, duration = $2, step = $3, previews = $4, \
             thumbnail = $5, updated_at = NOW() \
         WHERE reference = $1 \
         RETURNING {VIDEO_COLUMNS}"
    ))
    .bind(reference)
    .bind(duration)
    .bind(step)
    .bind(previews)
    .bind(thumbnail)
    .fetch_optional(pool)
    .await?;

    Ok(video)
}

/// Delete one record; returns whether a row was removed.
pub async fn delete_by_reference(pool: &PgPool, reference: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM videos WHERE reference = $1")
        .bind(reference)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests require PostgreSQL; run with:
    // DATABASE_URL=... cargo test -- --ignored

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL for integration tests");
        let pool = PgPool::connect(&url).await.expect("connect");
        crate::db::MIGRATOR.run(&pool).await.expect("migrate");
        pool
    }

    #[ignore]
    #[tokio::test]
    async fn test_create_and_find() {
        let pool = test_pool().await;
        let reference = crate::models::new_reference();

        let created = create_video(&pool, &reference, "Untitled", "video/mp4", 1234)
            .await
            .unwrap();
        assert!(!created.available);
        assert!(created.previews.is_empty());
        assert_eq!(created.size, 1234);

        let found = find_by_reference(&pool, &reference).await.unwrap().unwrap();
        assert_eq!(found.reference, reference);

        assert!(delete_by_reference(&pool, &reference).await.unwrap());
    }

    #[ignore]
    #[tokio::test]
    async fn test_apply_completion_is_idempotent() {
        let pool = test_pool().await;
        let reference = crate::models::new_reference();
        create_video(&pool, &reference, "Untitled", "video/mp4", 1234)
            .await
            .unwrap();

        let previews = vec!["p1".to_string(), "p2".to_string()];
        let first = apply_completion(&pool, &reference, 120, 10, &previews, "p1")
            .await
            .unwrap()
            .unwrap();
        let second = apply_completion(&pool, &reference, 120, 10, &previews, "p1")
            .await
            .unwrap()
            .unwrap();

        assert!(first.available && second.available);
        assert_eq!(first.duration, second.duration);
        assert_eq!(first.step, second.step);
        assert_eq!(first.previews, second.previews);
        assert_eq!(first.thumbnail, second.thumbnail);

        delete_by_reference(&pool, &reference).await.unwrap();
    }

    #[ignore]
    #[tokio::test]
    async fn test_completion_for_unknown_reference_is_none() {
        let pool = test_pool().await;
        let missing = apply_completion(&pool, "vid_missing", 1, 1, &["p".to_string()], "p")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
