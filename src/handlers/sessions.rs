//! Session lifecycle endpoints.
//!
//! Sessions group consecutive analyses of the same conversation so the
//! insights engine can compare runs against each other. These handlers are
//! thin wrappers over [`SessionStore`](crate::session::SessionStore).

use crate::{error::{AppError, AppResult}, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

/// Create a fresh review session.
///
/// ## Endpoint: `POST /api/v1/sessions`
///
/// Returns the generated session id. Clients typically open their WebSocket
/// subscription with this id before uploading any audio.
pub async fn create_session(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let session_id = state.store.get_or_create(None);
    info!("Created session {}", session_id);

    Ok(HttpResponse::Created().json(json!({
        "session_id": session_id,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Fetch the retained analysis history for a session, oldest first.
///
/// ## Endpoint: `GET /api/v1/sessions/{id}/history`
///
/// Unknown session ids are a 404; an existing session with no completed
/// analyses yet returns an empty list.
pub async fn session_history(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let session_id = path.into_inner();

    if !state.store.exists(&session_id) {
        return Err(AppError::SessionNotFound(session_id));
    }

    let history = state.store.get_history(&session_id);
    Ok(HttpResponse::Ok().json(history))
}

/// Drop a session and everything retained for it.
///
/// ## Endpoint: `DELETE /api/v1/sessions/{id}`
///
/// Deleting an unknown session is not an error; `deleted` reports whether
/// anything was actually removed.
pub async fn delete_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let session_id = path.into_inner();
    let deleted = state.store.delete(&session_id);

    if deleted {
        info!("Deleted session {}", session_id);
    }

    Ok(HttpResponse::Ok().json(json!({
        "session_id": session_id,
        "deleted": deleted
    })))
}
