/// Wire envelopes for the notifications channel
///
/// Outbound events wrap a payload in `{"type": ..., "payload": ...}`;
/// inbound client messages use the same shape.
use serde::{Deserialize, Serialize};

use crate::models::VideoResponse;

pub const SINGLE_VIDEO_UPDATE: &str = "event/single-video-update";
pub const BATCH_VIDEO_UPDATE: &str = "event/batch-video-update";

/// Outbound push event
#[derive(Debug, Clone, Serialize)]
pub struct PushEvent<T> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub payload: T,
}

pub fn single_update(video: &VideoResponse) -> PushEvent<&VideoResponse> {
    PushEvent {
        kind: SINGLE_VIDEO_UPDATE,
        payload: video,
    }
}

pub fn batch_update(videos: &[VideoResponse]) -> PushEvent<&[VideoResponse]> {
    PushEvent {
        kind: BATCH_VIDEO_UPDATE,
        payload: videos,
    }
}

/// Inbound client message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// A player reporting a view; payload is the video id.
    #[serde(rename = "event/increment-view-count")]
    IncrementViewCount { payload: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Video;
    use chrono::Utc;

    fn sample_view() -> VideoResponse {
        VideoResponse::new(
            Video {
                id: 1,
                reference: "vid_x".into(),
                title: "Untitled".into(),
                mimetype: "video/mp4".into(),
                size: 1,
                available: true,
                duration: 10,
                step: 2,
                previews: vec!["p1".into()],
                thumbnail: Some("p1".into()),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            0,
        )
    }

    #[test]
    fn test_single_update_envelope() {
        let view = sample_view();
        let value = serde_json::to_value(single_update(&view)).unwrap();
        assert_eq!(value["type"], "event/single-video-update");
        assert_eq!(value["payload"]["id"], "vid_x");
    }

    #[test]
    fn test_batch_update_envelope() {
        let views = vec![sample_view()];
        let value = serde_json::to_value(batch_update(&views)).unwrap();
        assert_eq!(value["type"], "event/batch-video-update");
        assert!(value["payload"].is_array());
    }

    #[test]
    fn test_inbound_view_count_event() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"type":"event/increment-view-count","payload":"vid_x"}"#,
        )
        .unwrap();
        let ClientEvent::IncrementViewCount { payload } = event;
        assert_eq!(payload, "vid_x");
    }
}
