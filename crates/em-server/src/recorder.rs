//! Database-backed [`VideoRecorder`].
//!
//! Every state write goes straight to SQLite and is mirrored onto the
//! [`EventBus`] for SSE subscribers.

use std::sync::Arc;

use em_core::events::{EventBus, EventPayload};
use em_core::{Result, VideoId};
use em_db::pool::{get_conn, DbPool};
use em_db::queries::videos;
use em_pipeline::VideoRecorder;

pub struct DbVideoRecorder {
    db: DbPool,
    event_bus: Arc<EventBus>,
}

impl DbVideoRecorder {
    pub fn new(db: DbPool, event_bus: Arc<EventBus>) -> Self {
        Self { db, event_bus }
    }
}

impl VideoRecorder for DbVideoRecorder {
    fn mark_encoding(&self, id: VideoId) -> Result<bool> {
        let conn = get_conn(&self.db)?;
        let found = videos::mark_encoding(&conn, id)?;
        if found {
            self.event_bus
                .broadcast(EventPayload::VideoEncoding { video_id: id });
        }
        Ok(found)
    }

    fn record_progress(&self, id: VideoId, progress: u8) -> Result<bool> {
        let conn = get_conn(&self.db)?;
        let found = videos::update_progress(&conn, id, progress)?;
        if found {
            self.event_bus.broadcast(EventPayload::VideoProgress {
                video_id: id,
                progress,
            });
        }
        Ok(found)
    }

    fn mark_complete(&self, id: VideoId) -> Result<bool> {
        let conn = get_conn(&self.db)?;
        videos::complete_video(&conn, id)
    }

    fn mark_failed(&self, id: VideoId, diagnostic: &str) -> Result<bool> {
        let conn = get_conn(&self.db)?;
        let found = videos::fail_video(&conn, id, diagnostic)?;
        if found {
            self.event_bus.broadcast(EventPayload::VideoFailed {
                video_id: id,
                error: diagnostic.to_string(),
            });
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use em_core::VideoState;
    use em_db::pool::init_memory_pool;
    use em_db::queries::encoders::create_encoder;

    fn setup() -> (DbPool, Arc<EventBus>, VideoId) {
        let db = init_memory_pool().unwrap();
        let conn = get_conn(&db).unwrap();
        let enc = create_encoder(&conn, "h264").unwrap();
        let video = videos::create_video(&conn, "/media/a.mp4", enc.id, None).unwrap();
        (db.clone(), Arc::new(EventBus::default()), video.id)
    }

    #[test]
    fn writes_state_and_broadcasts() {
        let (db, bus, id) = setup();
        let recorder = DbVideoRecorder::new(db.clone(), bus.clone());

        assert!(recorder.mark_encoding(id).unwrap());
        assert!(recorder.record_progress(id, 42).unwrap());

        let conn = get_conn(&db).unwrap();
        let video = videos::get_video(&conn, id).unwrap().unwrap();
        assert_eq!(video.state, VideoState::Encoding);
        assert_eq!(video.progress, 42);

        let recent = bus.recent_events(10);
        assert_eq!(
            recent[0].payload,
            EventPayload::VideoProgress {
                video_id: id,
                progress: 42
            }
        );
        assert_eq!(recent[1].payload, EventPayload::VideoEncoding { video_id: id });
    }

    #[test]
    fn failure_keeps_diagnostic() {
        let (db, bus, id) = setup();
        let recorder = DbVideoRecorder::new(db.clone(), bus);

        recorder.mark_encoding(id).unwrap();
        assert!(recorder.mark_failed(id, "step 1 (x) failed").unwrap());

        let conn = get_conn(&db).unwrap();
        let video = videos::get_video(&conn, id).unwrap().unwrap();
        assert_eq!(video.state, VideoState::Error);
        assert_eq!(video.error.as_deref(), Some("step 1 (x) failed"));
    }

    #[test]
    fn deleted_video_reports_gone_without_event() {
        let (db, bus, id) = setup();
        let recorder = DbVideoRecorder::new(db.clone(), bus.clone());
        videos::delete_video(&get_conn(&db).unwrap(), id).unwrap();

        assert!(!recorder.mark_encoding(id).unwrap());
        assert!(!recorder.record_progress(id, 10).unwrap());
        assert!(!recorder.mark_complete(id).unwrap());
        assert!(bus.recent_events(10).is_empty());
    }
}
