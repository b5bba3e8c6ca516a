//! Management surface under `/_uni`: scenario CRUD and liveness.
//!
//! Thin adapters over the scenario registry. POST and PUT insist on a JSON
//! content type (415 otherwise) and reject bodies that do not parse (400).

use crate::dispatch::AppState;
use crate::error::MockError;
use crate::scenario::ScenarioDto;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};

/// GET /_uni/health — liveness probe.
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok" })),
    )
}

/// GET /_uni/scenarios — all registered scenarios, sorted by UUID.
pub async fn list_scenarios(State(state): State<AppState>) -> Json<Vec<ScenarioDto>> {
    let all = state.scenarios.list().await;
    Json(all.iter().map(ScenarioDto::from_scenario).collect())
}

/// POST /_uni/scenarios — register a scenario; 201 with the stored record.
pub async fn create_scenario(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let scenario = match parse_scenario_body(&headers, &body) {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };
    match state.scenarios.create(scenario).await {
        Ok(created) => {
            tracing::info!(
                uuid = %created.uuid,
                method = %created.method,
                path = %created.pattern.as_str(),
                "scenario registered"
            );
            (
                StatusCode::CREATED,
                Json(ScenarioDto::from_scenario(&created)),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /_uni/scenarios/{uuid}.
pub async fn get_scenario(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Response {
    match state.scenarios.get(&uuid).await {
        Some(s) => Json(ScenarioDto::from_scenario(&s)).into_response(),
        None => not_found(&uuid),
    }
}

/// PUT /_uni/scenarios/{uuid} — full replace; content-type policy as POST.
pub async fn update_scenario(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let scenario = match parse_scenario_body(&headers, &body) {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };
    match state.scenarios.update(&uuid, scenario).await {
        Ok(updated) => {
            tracing::info!(uuid = %updated.uuid, "scenario updated");
            Json(ScenarioDto::from_scenario(&updated)).into_response()
        }
        Err(MockError::NotFound) => not_found(&uuid),
        Err(e) => e.into_response(),
    }
}

/// DELETE /_uni/scenarios/{uuid} — 204 on success.
pub async fn delete_scenario(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Response {
    match state.scenarios.delete(&uuid).await {
        Ok(()) => {
            tracing::info!(uuid = %uuid, "scenario deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(MockError::NotFound) => not_found(&uuid),
        Err(e) => e.into_response(),
    }
}

fn parse_scenario_body(
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<crate::scenario::Scenario, MockError> {
    require_json(headers)?;
    let dto: ScenarioDto = serde_json::from_slice(body)
        .map_err(|e| MockError::BadRequest(format!("invalid scenario JSON: {e}")))?;
    dto.into_scenario()
}

/// Strict media-type check for scenario mutations. No sniffing.
fn require_json(headers: &HeaderMap) -> Result<(), MockError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type.starts_with("application/json") {
        Ok(())
    } else {
        Err(MockError::UnsupportedMediaType(content_type.to_string()))
    }
}

fn not_found(uuid: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "scenario not found", "uuid": uuid })),
    )
        .into_response()
}
