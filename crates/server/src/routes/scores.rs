//! Score book endpoint

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoresResponse {
    scores: BTreeMap<String, u32>,
    total_score: u64,
    cases_completed: usize,
}

/// GET /api/scores - Best score per case plus totals
pub async fn get(State(state): State<AppState>) -> Json<ScoresResponse> {
    let book = state.scores.lock().await;
    Json(ScoresResponse {
        scores: book.as_map().clone(),
        total_score: book.total_score(),
        cases_completed: book.cases_completed(),
    })
}
