//! Conversation session endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::server::state::AppState;
use crate::types::SessionClearedResponse;

/// DELETE /session/:id - Clear a conversation
pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<SessionClearedResponse> {
    let existed = state.sessions().remove(&session_id);
    tracing::info!("Cleared session {} (existed: {})", session_id, existed);

    Json(SessionClearedResponse {
        success: true,
        session_id,
        existed,
    })
}
