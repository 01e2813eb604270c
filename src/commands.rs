//! Encoder and video management commands.
//!
//! These work directly against the database, so they can be used whether or
//! not a server is running. A running server picks up queued videos on its
//! next poll.

use anyhow::{bail, Context, Result};

use em_core::{EncoderId, EncodingTaskId, VideoId, VideoState};
use em_db::models::{Encoder, Video};
use em_db::pool::{get_conn, DbPool, PooledConnection};
use em_db::queries::{encoders, encoding_tasks, videos};

use crate::cli::{EncoderCommand, VideoCommand};

pub fn run_encoder(db: &DbPool, cmd: EncoderCommand) -> Result<()> {
    let conn = get_conn(db)?;

    match cmd {
        EncoderCommand::Create { name } => {
            let encoder = encoders::create_encoder(&conn, &name)?;
            println!("Created encoder {} ({})", encoder.name, encoder.id);
        }
        EncoderCommand::List => {
            let all = encoders::list_encoders(&conn)?;
            if all.is_empty() {
                println!("No encoders defined.");
            }
            for encoder in all {
                let tasks = encoding_tasks::list_tasks_for_encoder(&conn, encoder.id)?;
                println!("{}  {}  ({} tasks)", encoder.id, encoder.name, tasks.len());
            }
        }
        EncoderCommand::Show { encoder } => {
            let encoder = resolve_encoder(&conn, &encoder)?;
            println!("Encoder: {}", encoder.name);
            println!("ID: {}", encoder.id);
            println!("Created: {}", encoder.created_at);
            let tasks = encoding_tasks::list_tasks_for_encoder(&conn, encoder.id)?;
            println!("\nTasks: {}", tasks.len());
            for task in tasks {
                println!("  {}. {} [{}]", task.position, task.name, task.id);
                println!("      suffix:  {}", task.output_file_suffix);
                println!("      command: {}", task.command);
            }
        }
        EncoderCommand::AddTask {
            encoder,
            name,
            suffix,
            command,
        } => {
            let encoder = resolve_encoder(&conn, &encoder)?;
            let task = encoding_tasks::append_task(&conn, encoder.id, &name, &suffix, &command)?;
            println!(
                "Added task {} at position {} to {}",
                task.id, task.position, encoder.name
            );
        }
        EncoderCommand::RemoveTask { task } => {
            let id: EncodingTaskId = task.parse().context("invalid task ID")?;
            if !encoding_tasks::delete_task(&conn, id)? {
                bail!("task {id} not found");
            }
            println!("Removed task {id}");
        }
        EncoderCommand::Delete { encoder } => {
            let encoder = resolve_encoder(&conn, &encoder)?;
            encoders::delete_encoder(&conn, encoder.id)?;
            println!("Deleted encoder {}", encoder.name);
        }
    }

    Ok(())
}

pub fn run_video(db: &DbPool, cmd: VideoCommand) -> Result<()> {
    let conn = get_conn(db)?;

    match cmd {
        VideoCommand::Add {
            file,
            encoder,
            callback_url,
        } => {
            if !file.is_file() {
                tracing::warn!(
                    "{} does not exist yet; the first step will fail if it is still missing",
                    file.display()
                );
            }
            let encoder = resolve_encoder(&conn, &encoder)?;
            let file = file.to_string_lossy();
            let video = videos::create_video(&conn, &file, encoder.id, callback_url.as_deref())?;
            println!("Queued video {} with encoder {}", video.id, encoder.name);
        }
        VideoCommand::List { state, limit } => {
            let rows = match state {
                Some(s) => {
                    let state: VideoState = s.parse()?;
                    let mut rows = videos::list_videos_by_state(&conn, state)?;
                    rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
                    rows
                }
                None => videos::list_recent_videos(&conn, limit)?,
            };
            if rows.is_empty() {
                println!("No videos.");
            }
            for video in rows {
                println!(
                    "{}  {:<10} {:>3}%  {}",
                    video.id, video.state, video.progress, video.file
                );
            }
        }
        VideoCommand::Show { id } => {
            let video = load_video(&conn, &id)?;
            print_video(&video);
        }
        VideoCommand::Requeue { id } => {
            let video = load_video(&conn, &id)?;
            if !videos::requeue_video(&conn, video.id)? {
                bail!("video {} is {} and cannot be requeued", video.id, video.state);
            }
            println!("Requeued video {}", video.id);
        }
        VideoCommand::Delete { id } => {
            let video = load_video(&conn, &id)?;
            videos::delete_video(&conn, video.id)?;
            println!("Deleted video {}", video.id);
        }
    }

    Ok(())
}

/// Look an encoder up by ID, falling back to its name.
fn resolve_encoder(conn: &PooledConnection, key: &str) -> Result<Encoder> {
    if let Ok(id) = key.parse::<EncoderId>() {
        if let Some(encoder) = encoders::get_encoder(conn, id)? {
            return Ok(encoder);
        }
    }
    encoders::get_encoder_by_name(conn, key)?
        .with_context(|| format!("encoder {key:?} not found"))
}

fn load_video(conn: &PooledConnection, id: &str) -> Result<Video> {
    let id: VideoId = id.parse().context("invalid video ID")?;
    videos::get_video(conn, id)?.with_context(|| format!("video {id} not found"))
}

fn print_video(video: &Video) {
    println!("Video: {}", video.id);
    println!("File: {}", video.file);
    println!("Encoder: {}", video.encoder_id);
    println!("State: {}", video.state);
    println!("Progress: {}%", video.progress);
    if let Some(ref error) = video.error {
        println!("Error: {error}");
    }
    if let Some(ref url) = video.callback_url {
        println!("Callback: {url}");
    }
    println!("Created: {}", video.created_at);
    if let Some(ref started) = video.started_at {
        println!("Started: {started}");
    }
    if let Some(ref completed) = video.completed_at {
        println!("Finished: {completed}");
    }
}
