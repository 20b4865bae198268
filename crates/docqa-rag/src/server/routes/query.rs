//! Question endpoints

use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryRequest, QuestionRequest, QuestionResponse};

/// POST /question - Answer a question with source references
pub async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<QuestionResponse>> {
    answer(state, request).await
}

/// POST /query - Alias of `/question` taking `query` instead of `question`
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QuestionResponse>> {
    answer(state, request.into()).await
}

/// Run the pipeline in its own task so a dropped connection does not
/// abort generation halfway through a turn
async fn answer(state: AppState, request: QuestionRequest) -> Result<Json<QuestionResponse>> {
    tracing::info!("Question: {}", request.question);

    let pipeline = state.pipeline().clone();
    let result = tokio::spawn(async move {
        pipeline
            .answer(&request.question, request.session_id)
            .await
    })
    .await
    .map_err(|e| Error::internal(format!("Answer task failed: {}", e)))??;

    Ok(Json(result.into()))
}
