//! Simulation session handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use clinsim_core::{Difficulty, MessageSender, SimError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::ai::ProtocolFile;
use crate::error::AppError;
use crate::session::{SessionHandle, SessionState, SessionView, driver, ops};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    case_id: String,
    /// Play the case at another difficulty than authored
    #[serde(default)]
    difficulty: Option<Difficulty>,
    /// Reference protocol shown to the examiner
    #[serde(default)]
    protocol: Option<ProtocolFile>,
}

#[derive(Deserialize)]
pub struct MessageRequest {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    test_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretRequest {
    result_text: String,
}

#[derive(Deserialize)]
pub struct TutorRequest {
    question: String,
}

#[derive(Serialize)]
pub struct TutorResponse {
    answer: String,
}

#[derive(Deserialize)]
pub struct ReflectionRequest {
    text: String,
}

#[derive(Serialize)]
pub struct ReflectionResponse {
    question: String,
}

#[derive(Deserialize)]
pub struct AutopilotRequest {
    enabled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    #[serde(default)]
    handover_note: String,
    /// Score without a handover note
    #[serde(default)]
    skip_handover: bool,
}

async fn view(handle: &SessionHandle) -> Json<SessionView> {
    Json(handle.lock().await.view())
}

/// POST /api/sessions - Start a session on a catalog case
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<StartRequest>,
) -> Result<impl IntoResponse, AppError> {
    let simulator = state.simulator()?;
    let mut case = state
        .catalog
        .read()
        .await
        .get(&body.case_id)
        .cloned()
        .ok_or_else(|| SimError::CaseNotFound(body.case_id.clone()))?;
    if let Some(difficulty) = body.difficulty {
        case.difficulty = difficulty;
    }

    let session = SessionState::new(Uuid::new_v4(), case.clone(), body.protocol);
    let (id, generation) = (session.id(), session.generation());
    let handle = state.sessions.insert(session).await;

    let (chat, opening) = simulator.start_session(&case).await;
    handle.lock().await.activate(generation, chat, opening)?;

    metrics::counter!("sessions_started_total").increment(1);
    tracing::info!(session_id = %id, case_id = %case.id, "Session started");

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/sessions/{}", id).parse() {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, view(&handle).await))
}

/// GET /api/sessions/{id}
pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.get(id).await?;
    Ok(view(&handle).await)
}

/// DELETE /api/sessions/{id} - Leave without scoring
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    tracing::info!(session_id = %id, "Session ended");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sessions/{id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<SessionView>, AppError> {
    if body.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message text is required".to_string()));
    }
    let simulator = state.simulator()?;
    let handle = state.sessions.get(id).await?;

    ops::send_message(&handle, simulator, body.text.trim(), MessageSender::User).await?;
    driver::kick(&handle, simulator, state.autopilot_max_turns).await;
    Ok(view(&handle).await)
}

/// POST /api/sessions/{id}/orders
pub async fn order_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<OrderRequest>,
) -> Result<Json<SessionView>, AppError> {
    if body.test_name.trim().is_empty() {
        return Err(AppError::BadRequest("Test name is required".to_string()));
    }
    let simulator = state.simulator()?;
    let handle = state.sessions.get(id).await?;

    match ops::order_test(&handle, simulator, body.test_name.trim()).await {
        // the result is already in the transcript; only the patient missed it
        Err(SimError::Model(e)) => {
            tracing::warn!(session_id = %id, error = %e, "Lab result not shared with patient");
        }
        other => other?,
    }
    driver::kick(&handle, simulator, state.autopilot_max_turns).await;
    Ok(view(&handle).await)
}

/// POST /api/sessions/{id}/interpret
pub async fn interpret(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<InterpretRequest>,
) -> Result<Json<SessionView>, AppError> {
    let simulator = state.simulator()?;
    let handle = state.sessions.get(id).await?;

    ops::interpret(&handle, simulator, &body.result_text).await?;
    driver::kick(&handle, simulator, state.autopilot_max_turns).await;
    Ok(view(&handle).await)
}

/// POST /api/sessions/{id}/tutor
pub async fn ask_tutor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TutorRequest>,
) -> Result<Json<TutorResponse>, AppError> {
    let simulator = state.simulator()?;
    let handle = state.sessions.get(id).await?;

    let answer = ops::ask_tutor(&handle, simulator, &body.question).await?;
    Ok(Json(TutorResponse { answer }))
}

/// POST /api/sessions/{id}/reflection - Mentor follow-up on a scored session
pub async fn reflection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReflectionRequest>,
) -> Result<Json<ReflectionResponse>, AppError> {
    let simulator = state.simulator()?;
    let handle = state.sessions.get(id).await?;

    let question = ops::reflect(&handle, simulator, &body.text).await?;
    Ok(Json(ReflectionResponse { question }))
}

/// POST /api/sessions/{id}/autopilot - Switch the AI clinician on or off
pub async fn autopilot(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AutopilotRequest>,
) -> Result<Json<SessionView>, AppError> {
    let simulator = state.simulator()?;
    let handle = state.sessions.get(id).await?;

    let start_driver = handle.lock().await.set_autopilot(body.enabled)?;
    tracing::info!(session_id = %id, enabled = body.enabled, "Autopilot toggled");
    if start_driver {
        tokio::spawn(driver::run(
            handle.clone(),
            simulator.clone(),
            state.autopilot_max_turns,
        ));
    }
    Ok(view(&handle).await)
}

/// POST /api/sessions/{id}/handover
pub async fn handover(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.get(id).await?;
    handle.lock().await.begin_handover()?;
    Ok(view(&handle).await)
}

/// POST /api/sessions/{id}/resume - Back from handover to the encounter
pub async fn resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.get(id).await?;
    handle.lock().await.resume()?;
    Ok(view(&handle).await)
}

/// POST /api/sessions/{id}/evaluate - Score the session and record the result
pub async fn evaluate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<EvaluateRequest>,
) -> Result<Json<SessionView>, AppError> {
    let simulator = state.simulator()?;
    let handle = state.sessions.get(id).await?;

    let ticket = handle
        .lock()
        .await
        .begin_evaluation(&body.handover_note, body.skip_handover)?;
    let score = simulator
        .evaluate_session(
            &ticket.case,
            &ticket.transcript,
            &ticket.handover_note,
            ticket.protocol.as_ref(),
        )
        .await;

    let total = score.total_score;
    let applied = handle
        .lock()
        .await
        .finish_evaluation(ticket.generation, score);
    if applied {
        metrics::counter!("sessions_scored_total").increment(1);
        tracing::info!(session_id = %id, case_id = %ticket.case.id, score = total, "Session scored");
        state.record_score(&ticket.case.id, total).await;
    }

    Ok(view(&handle).await)
}
