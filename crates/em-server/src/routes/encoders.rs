//! Encoder route handlers (read-only).

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use em_core::EncoderId;
use em_db::models::{Encoder, EncodingTask};
use em_db::pool::get_conn;
use em_db::queries::{encoders, encoding_tasks};

use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub position: i64,
    pub name: String,
    pub output_file_suffix: String,
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct EncoderResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub tasks: Vec<TaskResponse>,
}

impl EncoderResponse {
    fn from_model(encoder: &Encoder, tasks: &[EncodingTask]) -> Self {
        Self {
            id: encoder.id.to_string(),
            name: encoder.name.clone(),
            created_at: encoder.created_at.clone(),
            tasks: tasks
                .iter()
                .map(|t| TaskResponse {
                    id: t.id.to_string(),
                    position: t.position,
                    name: t.name.clone(),
                    output_file_suffix: t.output_file_suffix.clone(),
                    command: t.command.clone(),
                })
                .collect(),
        }
    }
}

/// GET /api/encoders
pub async fn list_encoders(
    State(ctx): State<AppContext>,
) -> Result<Json<Vec<EncoderResponse>>, AppError> {
    let conn = get_conn(&ctx.db)?;
    let mut out = Vec::new();
    for encoder in encoders::list_encoders(&conn)? {
        let tasks = encoding_tasks::list_tasks_for_encoder(&conn, encoder.id)?;
        out.push(EncoderResponse::from_model(&encoder, &tasks));
    }
    Ok(Json(out))
}

/// GET /api/encoders/{id}
pub async fn get_encoder(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<EncoderResponse>, AppError> {
    let encoder_id: EncoderId = id
        .parse()
        .map_err(|_| em_core::Error::Validation("Invalid encoder ID".into()))?;

    let conn = get_conn(&ctx.db)?;
    let encoder = encoders::get_encoder(&conn, encoder_id)?
        .ok_or_else(|| em_core::Error::not_found("encoder", encoder_id))?;
    let tasks = encoding_tasks::list_tasks_for_encoder(&conn, encoder_id)?;

    Ok(Json(EncoderResponse::from_model(&encoder, &tasks)))
}
