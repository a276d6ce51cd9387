/// Notifications channel - websocket upgrade with catch-up
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::warn;

use crate::cache::ViewCounter;
use crate::db::video_repo;
use crate::websocket::session::NotificationSession;
use crate::websocket::ConnectionRegistry;

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    pub token: Option<String>,
}

/// A missing or unparsable token means "everything since epoch".
fn token_timestamp(token: Option<&str>) -> DateTime<Utc> {
    token
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Upgrade to a websocket and deliver the catch-up snapshot: every record
/// mutated after the client's token, as one batch. An up-to-date client
/// gets nothing at all.
pub async fn notifications(
    req: HttpRequest,
    query: web::Query<NotificationsQuery>,
    payload: web::Payload,
    pool: web::Data<PgPool>,
    counter: web::Data<ViewCounter>,
    registry: web::Data<ConnectionRegistry>,
) -> actix_web::Result<HttpResponse> {
    let since = token_timestamp(query.token.as_deref());

    let missed = video_repo::list_updated_since(&pool, since)
        .await
        .map_err(actix_web::Error::from)?;

    let catchup = if missed.is_empty() {
        None
    } else {
        let references: Vec<String> = missed.iter().map(|v| v.reference.clone()).collect();
        let views = match counter.get_many(&references).await {
            Ok(views) => views,
            Err(e) => {
                warn!(error = %e, "View count lookup failed for catch-up, reporting zeros");
                vec![0; missed.len()]
            }
        };

        let videos: Vec<crate::models::VideoResponse> = missed
            .into_iter()
            .zip(views)
            .map(|(video, views)| crate::models::VideoResponse::new(video, views))
            .collect();

        Some(ConnectionRegistry::batch_message(&videos).map_err(actix_web::Error::from)?)
    };

    let session = NotificationSession::new(
        registry.get_ref().clone(),
        counter.get_ref().clone(),
        catchup,
    );

    ws::start(session, &req, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parses_epoch_millis() {
        let ts = token_timestamp(Some("1700000000000"));
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_missing_or_invalid_token_means_epoch() {
        assert_eq!(token_timestamp(None).timestamp_millis(), 0);
        assert_eq!(token_timestamp(Some("garbage")).timestamp_millis(), 0);
        assert_eq!(token_timestamp(Some("")).timestamp_millis(), 0);
    }
}
