//! Completion notifications.
//!
//! When a video finishes its chain, a `video_completed` event goes onto the
//! bus and, if the video was submitted with a `callback_url`, a JSON POST
//! is fired at that URL. Callbacks are fire-and-forget: errors are logged
//! but never reach the pipeline.

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;

use em_core::config::NotificationConfig;
use em_core::events::{EventBus, EventPayload};
use em_core::VideoId;
use em_db::pool::{get_conn, DbPool};
use em_db::queries::videos;
use em_pipeline::CompletionNotifier;

/// Body POSTed to a video's callback URL.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackPayload {
    pub id: VideoId,
    pub file: String,
    pub state: &'static str,
}

/// Announces finished videos on the event bus and to callback URLs.
///
/// Holds a shared [`reqwest::Client`] so connection pools are reused across
/// callbacks.
pub struct CompletionHooks {
    db: DbPool,
    event_bus: Arc<EventBus>,
    client: Client,
}

impl CompletionHooks {
    pub fn new(db: DbPool, event_bus: Arc<EventBus>, config: &NotificationConfig) -> Self {
        let client = Client::builder()
            .timeout(config.callback_timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build callback HTTP client: {e}");
                Client::new()
            });

        Self {
            db,
            event_bus,
            client,
        }
    }

    /// Look up the callback target for a video, if it has one.
    fn callback_for(&self, video_id: VideoId) -> Option<(String, CallbackPayload)> {
        let conn = match get_conn(&self.db) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(video_id = %video_id, "Cannot load video for callback: {e}");
                return None;
            }
        };

        match videos::get_video(&conn, video_id) {
            Ok(Some(video)) => {
                let url = video.callback_url?;
                Some((
                    url,
                    CallbackPayload {
                        id: video.id,
                        file: video.file,
                        state: video.state.as_str(),
                    },
                ))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(video_id = %video_id, "Cannot load video for callback: {e}");
                None
            }
        }
    }
}

impl CompletionNotifier for CompletionHooks {
    fn notify_complete(&self, video_id: VideoId) {
        self.event_bus
            .broadcast(EventPayload::VideoCompleted { video_id });

        let Some((url, payload)) = self.callback_for(video_id) else {
            return;
        };

        let client = self.client.clone();
        tokio::spawn(async move {
            post_callback(&client, &url, &payload).await;
        });
    }
}

/// POST `payload` to `url`, logging the outcome.
pub async fn post_callback(client: &Client, url: &str, payload: &CallbackPayload) {
    tracing::info!(video_id = %payload.id, url = %url, "Sending completion callback");

    match client.post(url).json(payload).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::debug!(video_id = %payload.id, "Completion callback delivered");
        }
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(
                video_id = %payload.id,
                status = %status,
                body = %body,
                "Completion callback returned non-success status"
            );
        }
        Err(e) => {
            tracing::warn!(
                video_id = %payload.id,
                error = %e,
                "Completion callback failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use em_db::pool::init_memory_pool;
    use em_db::queries::encoders::create_encoder;

    #[tokio::test]
    async fn completion_broadcasts_event() {
        let db = init_memory_pool().unwrap();
        let bus = Arc::new(EventBus::default());
        let id = {
            let conn = get_conn(&db).unwrap();
            let enc = create_encoder(&conn, "h264").unwrap();
            let video = videos::create_video(&conn, "/media/a.mp4", enc.id, None).unwrap();
            videos::complete_video(&conn, video.id).unwrap();
            video.id
        };

        let hooks = CompletionHooks::new(db, bus.clone(), &NotificationConfig::default());
        hooks.notify_complete(id);

        let recent = bus.recent_events(1);
        assert_eq!(recent[0].payload, EventPayload::VideoCompleted { video_id: id });
    }

    #[tokio::test]
    async fn callback_target_uses_stored_url() {
        let db = init_memory_pool().unwrap();
        let (with_url, without_url) = {
            let conn = get_conn(&db).unwrap();
            let enc = create_encoder(&conn, "h264").unwrap();
            let a = videos::create_video(&conn, "/media/a.mp4", enc.id, Some("http://127.0.0.1:9/hook"))
                .unwrap();
            let b = videos::create_video(&conn, "/media/b.mp4", enc.id, None).unwrap();
            videos::complete_video(&conn, a.id).unwrap();
            (a.id, b.id)
        };

        let hooks = CompletionHooks::new(
            db,
            Arc::new(EventBus::default()),
            &NotificationConfig::default(),
        );

        let (url, payload) = hooks.callback_for(with_url).unwrap();
        assert_eq!(url, "http://127.0.0.1:9/hook");
        assert_eq!(payload.state, "complete");
        assert_eq!(payload.file, "/media/a.mp4");
        assert!(hooks.callback_for(without_url).is_none());
    }

    #[test]
    fn callback_payload_shape() {
        let payload = CallbackPayload {
            id: VideoId::new(),
            file: "/media/a.mp4".into(),
            state: "complete",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["state"], "complete");
        assert_eq!(json["file"], "/media/a.mp4");
        assert!(json["id"].is_string());
    }
}
