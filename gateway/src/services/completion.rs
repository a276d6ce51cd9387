/// Completion event consumer
///
/// Consumes the external worker's completion events, applies them to the
/// catalog, and raises the realtime update. A message is committed only
/// after both succeeded; failed messages stay uncommitted and are
/// redelivered by the broker after a restart or rebalance.
use rand::Rng;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::cache::ViewCounter;
use crate::db::video_repo;
use crate::error::{AppError, Result};
use crate::models::{CompletionEvent, VideoResponse};
use crate::websocket::ConnectionRegistry;

pub struct CompletionConsumer {
    consumer: StreamConsumer,
    pool: PgPool,
    counter: ViewCounter,
    registry: ConnectionRegistry,
    shutdown_rx: watch::Receiver<bool>,
}

impl CompletionConsumer {
    pub fn new(
        consumer: StreamConsumer,
        pool: PgPool,
        counter: ViewCounter,
        registry: ConnectionRegistry,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            consumer,
            pool,
            counter,
            registry,
            shutdown_rx,
        }
    }

    /// Run the consumer loop until shutdown. Per-message failures never
    /// terminate the subscription.
    pub async fn run(&mut self) -> Result<()> {
        use futures::StreamExt;

        info!("Starting completion consumer loop");

        let mut message_stream = self.consumer.stream();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping consumer");
                        break;
                    }
                }

                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            match self.process_message(msg.payload()).await {
                                Ok(reference) => {
                                    // Acknowledge only after the catalog update
                                    // and the broadcast both completed.
                                    if let Err(e) = self
                                        .consumer
                                        .commit_message(&msg, CommitMode::Async)
                                    {
                                        warn!(reference = %reference, error = %e,
                                            "Failed to commit completion event");
                                    }
                                }
                                Err(e) => {
                                    // Left uncommitted for broker-level
                                    // redelivery and inspection.
                                    error!(error = %e, "Failed to process completion event");
                                }
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Completion consumer error");
                        }
                        None => {
                            warn!("Completion stream ended unexpectedly");
                            break;
                        }
                    }
                }
            }
        }

        info!("Completion consumer stopped");
        Ok(())
    }

    /// received → parsed → applied → broadcast. Returns the reference so the
    /// caller can log the commit against it.
    async fn process_message(&self, payload: Option<&[u8]>) -> Result<String> {
        let payload =
            payload.ok_or_else(|| AppError::Internal("Empty completion payload".to_string()))?;
        let event: CompletionEvent = serde_json::from_slice(payload)?;

        if event.previews.is_empty() {
            return Err(AppError::Internal(format!(
                "Completion event for '{}' carries no previews",
                event.reference
            )));
        }

        let thumbnail = pick_thumbnail(&event.previews).to_string();

        let video = video_repo::apply_completion(
            &self.pool,
            &event.reference,
            event.duration,
            event.step,
            &event.previews,
            &thumbnail,
        )
        .await?
        .ok_or_else(|| {
            // A completion event for an unknown reference means the catalog
            // and the queue have diverged; surface it, do not drop it.
            AppError::Internal(format!(
                "No catalog record for completed reference '{}'",
                event.reference
            ))
        })?;

        info!(
            reference = %video.reference,
            duration = video.duration,
            previews = video.previews.len(),
            "Video is now available"
        );

        let views = match self.counter.get(&video.reference).await {
            Ok(views) => views,
            Err(e) => {
                warn!(reference = %video.reference, error = %e, "View count lookup failed");
                0
            }
        };

        let reference = video.reference.clone();
        let view = VideoResponse::new(video, views);
        self.registry.broadcast_single(&view).await?;

        Ok(reference)
    }
}

/// Pick the listing thumbnail uniformly at random from the previews.
fn pick_thumbnail(previews: &[String]) -> &str {
    let index = rand::thread_rng().gen_range(0..previews.len());
    &previews[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_is_one_of_the_previews() {
        let previews: Vec<String> = vec!["p1".into(), "p2".into(), "p3".into()];
        for _ in 0..200 {
            let picked = pick_thumbnail(&previews);
            assert!(previews.iter().any(|p| p == picked));
        }
    }

    #[test]
    fn test_single_preview_is_always_picked() {
        let previews: Vec<String> = vec!["only".into()];
        assert_eq!(pick_thumbnail(&previews), "only");
    }
}
