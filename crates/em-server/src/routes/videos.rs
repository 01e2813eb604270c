//! Video route handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use em_core::{EncoderId, VideoId, VideoState};
use em_db::models::Video;
use em_db::queries::videos::DEFAULT_LIST_LIMIT;

use crate::context::AppContext;
use crate::error::AppError;

/// Query parameters for listing videos.
#[derive(Debug, Deserialize)]
pub struct ListVideosParams {
    pub state: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIST_LIMIT
}

/// Request body for queueing a video.
#[derive(Debug, Deserialize)]
pub struct CreateVideoRequest {
    pub file: String,
    pub encoder_id: String,
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VideoResponse {
    pub id: String,
    pub file: String,
    pub encoder_id: String,
    pub state: VideoState,
    pub progress: u8,
    pub error: Option<String>,
    pub callback_url: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl VideoResponse {
    fn from_model(video: &Video) -> Self {
        Self {
            id: video.id.to_string(),
            file: video.file.clone(),
            encoder_id: video.encoder_id.to_string(),
            state: video.state,
            progress: video.progress,
            error: video.error.clone(),
            callback_url: video.callback_url.clone(),
            created_at: video.created_at.clone(),
            started_at: video.started_at.clone(),
            completed_at: video.completed_at.clone(),
        }
    }
}

fn parse_video_id(id: &str) -> Result<VideoId, AppError> {
    id.parse()
        .map_err(|_| em_core::Error::Validation("Invalid video ID".into()).into())
}

/// GET /api/videos
pub async fn list_videos(
    State(ctx): State<AppContext>,
    Query(params): Query<ListVideosParams>,
) -> Result<Json<Vec<VideoResponse>>, AppError> {
    let state = params
        .state
        .as_deref()
        .map(str::parse::<VideoState>)
        .transpose()?;
    let rows = ctx.list_videos(state, params.limit.clamp(1, 1000))?;
    Ok(Json(rows.iter().map(VideoResponse::from_model).collect()))
}

/// POST /api/videos
pub async fn create_video(
    State(ctx): State<AppContext>,
    Json(payload): Json<CreateVideoRequest>,
) -> Result<impl IntoResponse, AppError> {
    let encoder_id: EncoderId = payload
        .encoder_id
        .parse()
        .map_err(|_| em_core::Error::Validation("Invalid encoder ID".into()))?;

    let video = ctx.enqueue_video(&payload.file, encoder_id, payload.callback_url.as_deref())?;
    Ok((StatusCode::CREATED, Json(VideoResponse::from_model(&video))))
}

/// GET /api/videos/{id}
pub async fn get_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    let video = ctx.video(parse_video_id(&id)?)?;
    Ok(Json(VideoResponse::from_model(&video)))
}

/// POST /api/videos/{id}/requeue
pub async fn requeue_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<VideoResponse>, AppError> {
    let video = ctx.requeue_video(parse_video_id(&id)?)?;
    Ok(Json(VideoResponse::from_model(&video)))
}

/// DELETE /api/videos/{id}
pub async fn delete_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.delete_video(parse_video_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}
