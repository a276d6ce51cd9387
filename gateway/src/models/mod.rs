/// Data models for the gateway
///
/// `Video` is the catalog entity; `VideoResponse` is the public wire view
/// with the internal row id dropped and `reference` exposed as `id`.
/// `ProcessingJob` and `CompletionEvent` are the queue payloads.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// MIME types accepted for upload.
pub const ACCEPTED_MIME_TYPES: [&str; 6] = [
    "video/avi",
    "video/mpeg",
    "video/x-mpeg",
    "video/mp4",
    "video/ogg",
    "video/webm",
];

pub fn is_accepted_mime(mimetype: &str) -> bool {
    ACCEPTED_MIME_TYPES.contains(&mimetype)
}

/// Generate a fresh video reference.
pub fn new_reference() -> String {
    format!("vid_{}", Uuid::new_v4().simple())
}

/// Video catalog entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    /// Internal row id, never exposed to clients.
    pub id: i64,
    pub reference: String,
    pub title: String,
    pub mimetype: String,
    pub size: i64,
    pub available: bool,
    pub duration: i32,
    pub step: i32,
    pub previews: Vec<String>,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public video view (wire JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub id: String,
    pub title: String,
    pub duration: i32,
    pub size: i64,
    pub available: bool,
    pub views: i64,
    pub previews: Vec<String>,
    pub step: i32,
    pub thumbnail: Option<String>,
    pub mimetype: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoResponse {
    pub fn new(video: Video, views: i64) -> Self {
        Self {
            id: video.reference,
            title: video.title,
            duration: video.duration,
            size: video.size,
            available: video.available,
            views,
            previews: video.previews,
            step: video.step,
            thumbnail: video.thumbnail,
            mimetype: video.mimetype,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}

impl From<Video> for VideoResponse {
    fn from(video: Video) -> Self {
        Self::new(video, 0)
    }
}

/// Catalog listing response; `token` lets a client resume live updates
/// from the moment this listing was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoListResponse {
    pub token: String,
    pub videos: Vec<VideoResponse>,
}

/// Processing job published once per upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub reference: String,
    pub mimetype: String,
}

/// Completion event consumed from the external worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub reference: String,
    pub duration: i32,
    pub step: i32,
    pub previews: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_video() -> Video {
        Video {
            id: 7,
            reference: "vid_abc123".to_string(),
            title: "Untitled".to_string(),
            mimetype: "video/mp4".to_string(),
            size: 10_000_000,
            available: true,
            duration: 120,
            step: 10,
            previews: vec!["p1".into(), "p2".into(), "p3".into()],
            thumbnail: Some("p2".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_accepted_mime_types() {
        assert!(is_accepted_mime("video/mp4"));
        assert!(is_accepted_mime("video/x-mpeg"));
        assert!(!is_accepted_mime("video/quicktime"));
        assert!(!is_accepted_mime("image/png"));
    }

    #[test]
    fn test_reference_format() {
        let reference = new_reference();
        assert!(reference.starts_with("vid_"));
        assert_ne!(reference, new_reference());
    }

    #[test]
    fn test_wire_view_field_names() {
        let view = VideoResponse::new(sample_video(), 42);
        let value = serde_json::to_value(&view).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "available",
                "createdAt",
                "duration",
                "id",
                "mimetype",
                "previews",
                "size",
                "step",
                "thumbnail",
                "title",
                "updatedAt",
                "views",
            ]
        );

        // The internal reference is surfaced as `id`; the row id is dropped.
        assert_eq!(object["id"], "vid_abc123");
        assert_eq!(object["views"], 42);
        assert_eq!(object["size"], 10_000_000);
    }

    #[test]
    fn test_completion_event_wire_shape() {
        let event: CompletionEvent = serde_json::from_str(
            r#"{"reference":"vid_x","duration":120,"step":10,"previews":["p1","p2"]}"#,
        )
        .unwrap();
        assert_eq!(event.reference, "vid_x");
        assert_eq!(event.duration, 120);
        assert_eq!(event.step, 10);
        assert_eq!(event.previews.len(), 2);
    }
}
