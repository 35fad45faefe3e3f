//! Case catalog and case authoring handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use clinsim_core::{
    CaseCategory, CaseFilter, ClinicalCase, DiagnosticAsset, Difficulty, Role, SimError,
    Visibility,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomCaseRequest {
    description: String,
    #[serde(default)]
    assets: Vec<DiagnosticAsset>,
    #[serde(default)]
    visibility: Option<Visibility>,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    institution_id: Option<String>,
}

#[derive(Deserialize)]
pub struct GenerateCaseRequest {
    role: Role,
    difficulty: Difficulty,
    category: CaseCategory,
}

#[derive(Serialize)]
pub struct AssetAnalysis {
    analysis: String,
}

fn created(case: ClinicalCase) -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/cases/{}", case.id).parse() {
        headers.insert(header::LOCATION, location);
    }
    (StatusCode::CREATED, headers, Json(case))
}

/// GET /api/cases - Browse the catalog
pub async fn search(
    State(state): State<AppState>,
    Query(filter): Query<CaseFilter>,
) -> Json<Vec<ClinicalCase>> {
    let catalog = state.catalog.read().await;
    Json(catalog.search(&filter).into_iter().cloned().collect())
}

/// GET /api/cases/{id}
pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClinicalCase>, AppError> {
    let catalog = state.catalog.read().await;
    catalog
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| SimError::CaseNotFound(id).into())
}

/// POST /api/cases - Author a case from a free-text description
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CustomCaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if body.description.trim().is_empty() {
        return Err(AppError::BadRequest("Case description is required".to_string()));
    }
    let simulator = state.simulator()?;

    let mut case = simulator
        .create_custom_case(&body.description, body.assets)
        .await?;
    case.visibility = body.visibility.or(Some(Visibility::Private));
    case.author_id = body.author_id;
    case.institution_id = body.institution_id;

    tracing::info!(case_id = %case.id, "Custom case created");
    state.catalog.write().await.add(case.clone());
    Ok(created(case))
}

/// POST /api/cases/$generate - Generate a case for a role, difficulty and category
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateCaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let simulator = state.simulator()?;
    let case = simulator
        .generate_clinical_case(body.role, body.difficulty, body.category)
        .await?;

    tracing::info!(case_id = %case.id, "Case generated");
    state.catalog.write().await.add(case.clone());
    Ok(created(case))
}

/// POST /api/assets/$analyze - Describe the findings in an uploaded asset
pub async fn analyze_asset(
    State(state): State<AppState>,
    Json(asset): Json<DiagnosticAsset>,
) -> Result<Json<AssetAnalysis>, AppError> {
    let simulator = state.simulator()?;
    let analysis = simulator.analyze_uploaded_asset(&asset).await;
    Ok(Json(AssetAnalysis { analysis }))
}
