//! Audio upload endpoint.
//!
//! Accepts a multipart upload, parks the audio under the configured upload
//! directory, and kicks off a detached pipeline run for it. The HTTP response
//! only acknowledges the upload; all analysis results arrive over the
//! session's WebSocket event stream.

use crate::pipeline::PipelineOrchestrator;
use crate::{error::{AppError, AppResult}, state::AppState};
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Run one review analysis over an uploaded recording.
///
/// ## Endpoint: `POST /api/v1/analyze`
///
/// ## Request:
/// Multipart form data:
/// - `audio` (required): the recording, WAV or raw 16-bit PCM
/// - `session_id` (optional): attach this run to an existing session;
///   omitted, a fresh session is created
/// - `transcript` (optional): reviewer-supplied transcript, stored as the
///   sidecar the transcription collaborator reads
///
/// ## Response:
/// `202 Accepted` with the session id as soon as the artifact is on disk.
/// `413` when the upload exceeds `storage.max_upload_bytes`, `503` when
/// `analysis.max_concurrent_runs` pipelines are already in flight.
pub async fn analyze(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> AppResult<HttpResponse> {
    let config = state.get_config();

    let mut audio_data: Option<Vec<u8>> = None;
    let mut session_id_field: Option<String> = None;
    let mut transcript_field: Option<String> = None;

    while let Some(item) = payload.next().await {
        let mut field: Field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .ok_or_else(|| AppError::BadRequest("Missing multipart field name".to_string()))?
            .to_string();

        match field_name.as_str() {
            "audio" => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk =
                        chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
                    if bytes.len() + chunk.len() > config.storage.max_upload_bytes {
                        return Err(AppError::PayloadTooLarge(format!(
                            "Upload exceeds the {} byte limit",
                            config.storage.max_upload_bytes
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                audio_data = Some(bytes);
            }
            "session_id" => {
                session_id_field = Some(read_text_field(&mut field).await?);
            }
            "transcript" => {
                transcript_field = Some(read_text_field(&mut field).await?);
            }
            other => {
                return Err(AppError::BadRequest(format!(
                    "Unexpected multipart field: {}",
                    other
                )));
            }
        }
    }

    let audio_bytes = audio_data
        .ok_or_else(|| AppError::BadRequest("No audio field in upload".to_string()))?;
    if audio_bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded audio is empty".to_string()));
    }

    // Reserve a run slot before touching the disk
    if !state.try_begin_run(config.analysis.max_concurrent_runs) {
        return Err(AppError::Busy(format!(
            "All {} analysis slots are in use, retry later",
            config.analysis.max_concurrent_runs
        )));
    }

    // Everything past this point must release the slot on failure
    let session_id = match stage_artifacts(
        &state,
        &config,
        &audio_bytes,
        session_id_field.as_deref(),
        transcript_field.as_deref(),
    )
    .await
    {
        Ok((session_id, audio_path, sidecar_path)) => {
            spawn_run(&state, &config, session_id.clone(), audio_path, sidecar_path);
            session_id
        }
        Err(err) => {
            state.end_run();
            return Err(err);
        }
    };

    Ok(HttpResponse::Accepted().json(json!({
        "session_id": session_id,
        "status": "accepted",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Write the upload (and optional transcript sidecar) under the upload dir
/// and resolve the session the run belongs to.
async fn stage_artifacts(
    state: &web::Data<AppState>,
    config: &crate::config::AppConfig,
    audio_bytes: &[u8],
    session_id: Option<&str>,
    transcript: Option<&str>,
) -> Result<(String, PathBuf, Option<PathBuf>), AppError> {
    let upload_dir = PathBuf::from(&config.storage.upload_dir);
    tokio::fs::create_dir_all(&upload_dir).await?;

    let artifact_id = uuid::Uuid::new_v4();
    let audio_path = upload_dir.join(format!("{}.wav", artifact_id));
    tokio::fs::write(&audio_path, audio_bytes).await?;

    let sidecar_path = match transcript {
        Some(text) => {
            let path = upload_dir.join(format!("{}.txt", artifact_id));
            tokio::fs::write(&path, text).await?;
            Some(path)
        }
        None => None,
    };

    let session_id = state.store.get_or_create(session_id);
    Ok((session_id, audio_path, sidecar_path))
}

/// Detach the pipeline run. The run releases its slot and cleans up the
/// transcript sidecar on every exit path; the orchestrator itself removes
/// the audio artifact.
fn spawn_run(
    state: &web::Data<AppState>,
    config: &crate::config::AppConfig,
    session_id: String,
    audio_path: PathBuf,
    sidecar_path: Option<PathBuf>,
) {
    let orchestrator = PipelineOrchestrator::new(
        state.hub.clone(),
        state.store.clone(),
        state.collaborators.clone(),
        config.analysis.trend_epsilon,
        Duration::from_secs(config.analysis.collaborator_timeout_secs),
    );
    let state = state.clone();

    info!(
        "Accepted upload for session {} ({} -> pipeline)",
        session_id,
        audio_path.display()
    );

    tokio::spawn(async move {
        orchestrator.run(&session_id, &audio_path).await;

        if let Some(sidecar) = sidecar_path {
            if let Err(err) = tokio::fs::remove_file(&sidecar).await {
                error!(
                    "Failed to remove transcript sidecar {}: {}",
                    sidecar.display(),
                    err
                );
            }
        }

        state.end_run();
    });
}

async fn read_text_field(field: &mut Field) -> Result<String, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes)
        .map(|s| s.trim().to_string())
        .map_err(|_| AppError::BadRequest("Text field is not valid UTF-8".to_string()))
}
