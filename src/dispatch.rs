//! Front-door request handling: management routes, then scenarios, then the
//! mock store via the matched section.
//!
//! Everything that is not a management route lands in the fallback handler.
//! A scenario match short-circuits the store entirely; otherwise the section
//! router decides how IDs are extracted and the method picks the store
//! operation.

use crate::error::MockError;
use crate::extract;
use crate::management;
use crate::pattern::split_path;
use crate::scenario::{Scenario, ScenarioRegistry};
use crate::section::{Section, SectionRouter};
use crate::store::{MockRecord, MockStore};
use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;
use uuid::Uuid;

/// Shared server state: the three long-lived stores behind every request.
#[derive(Clone)]
pub struct AppState {
    pub scenarios: Arc<ScenarioRegistry>,
    pub store: Arc<MockStore>,
    pub sections: Arc<SectionRouter>,
}

/// Reserved prefix for the management surface; never routed to sections.
pub const MANAGEMENT_PREFIX: &str = "/_uni/";

/// Build the full router: management routes plus the catch-all dispatcher.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/_uni/health", get(management::health))
        .route(
            "/_uni/scenarios",
            get(management::list_scenarios).post(management::create_scenario),
        )
        .route(
            "/_uni/scenarios/{uuid}",
            get(management::get_scenario)
                .put(management::update_scenario)
                .delete(management::delete_scenario),
        )
        .fallback(dispatch)
        .with_state(state)
}

async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // Reserved paths that fell through the management routes are dead ends.
    if path.starts_with(MANAGEMENT_PREFIX) {
        return (StatusCode::NOT_FOUND, "unknown management path\n").into_response();
    }

    if let Some(scenario) = state.scenarios.find(&method, &path).await {
        tracing::debug!(%method, %path, uuid = %scenario.uuid, "matched scenario");
        return scenario_response(&scenario);
    }

    let Some(section) = state.sections.match_path(&path) else {
        tracing::debug!(%method, %path, "no scenario or section matched");
        return (StatusCode::NOT_FOUND, "no mock configured for this path\n").into_response();
    };
    tracing::debug!(%method, %path, section = %section.name, "routed to mock store");

    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            return MockError::BadRequest(format!("failed to read request body: {e}"))
                .into_response();
        }
    };

    let result = match method.as_str() {
        "GET" => store_get(&state, &path, &parts.headers, section, false).await,
        "HEAD" => store_get(&state, &path, &parts.headers, section, true).await,
        "POST" => store_post(&state, &path, &parts.headers, &body, section).await,
        "PUT" | "PATCH" => store_update(&state, &method, &path, &parts.headers, &body, section).await,
        "DELETE" => store_delete(&state, &path, &parts.headers, section).await,
        "OPTIONS" => Ok(StatusCode::OK.into_response()),
        _ => Err(MockError::MethodNotAllowed),
    };
    result.unwrap_or_else(|e| e.into_response())
}

/// Compose a response straight from a scenario. Invalid header names or
/// values are skipped, not fatal.
fn scenario_response(s: &Scenario) -> Response {
    let mut response = Response::new(Body::from(s.body.clone()));
    *response.status_mut() = s.status;
    let headers = response.headers_mut();
    if !s.content_type.is_empty()
        && let Ok(v) = HeaderValue::try_from(s.content_type.as_str())
    {
        headers.insert(header::CONTENT_TYPE, v);
    }
    if !s.location.is_empty()
        && let Ok(v) = HeaderValue::try_from(s.location.as_str())
    {
        headers.insert(header::LOCATION, v);
    }
    for (k, v) in &s.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(k.as_str()),
            HeaderValue::try_from(v.as_str()),
        ) {
            headers.insert(name, value);
        }
    }
    response
}

async fn store_get(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    section: &Section,
    head: bool,
) -> Result<Response, MockError> {
    let ids = extract::extract_ids(&Method::GET, path, headers, b"", section)?;
    if let Some(id) = ids.first() {
        let record = state.store.get(id).await.ok_or(MockError::NotFound)?;
        return record_response(StatusCode::OK, &record, head);
    }

    let base = base_path(path);
    let records = state.store.get_by_path(&base).await;
    let root_collection = split_path(path).is_empty();
    if records.is_empty() && !root_collection {
        return Err(MockError::NotFound);
    }
    // Record bodies are stored as-is; the collection view is their raw
    // concatenation as a JSON array.
    let mut body: Vec<u8> = Vec::with_capacity(2 + records.iter().map(|r| r.body.len() + 1).sum::<usize>());
    body.push(b'[');
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            body.push(b',');
        }
        body.extend_from_slice(&record.body);
    }
    body.push(b']');
    let body = if head { Vec::new() } else { body };
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(|e| MockError::Internal(format!("response build failed: {e}")))
}

async fn store_post(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    body: &Bytes,
    section: &Section,
) -> Result<Response, MockError> {
    let mut ids = extract::extract_ids(&Method::POST, path, headers, body, section)?;
    if ids.is_empty() {
        // No body query engine for this content type and no deeper path
        // segment: mint an opaque ID instead of refusing the create.
        ids.push(Uuid::new_v4().to_string());
    }

    let base = base_path(path);
    let location = join_location(&base, &ids[0]);
    let record = MockRecord {
        ids,
        base_path: base,
        content_type: request_content_type(headers),
        location: Some(location.clone()),
        body: body.to_vec(),
    };
    let echo = if section.return_body {
        record.body.clone()
    } else {
        Vec::new()
    };
    let content_type = record.content_type.clone();
    state.store.create(record).await?;

    let mut builder = Response::builder()
        .status(StatusCode::CREATED)
        .header(header::LOCATION, location.as_str());
    if !content_type.is_empty() {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(echo))
        .map_err(|e| MockError::Internal(format!("response build failed: {e}")))
}

async fn store_update(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &Bytes,
    section: &Section,
) -> Result<Response, MockError> {
    let ids = extract::extract_ids(method, path, headers, body, section)?;
    let id = ids.first().ok_or(MockError::NotFound)?;
    let record = state
        .store
        .update(id, body.to_vec(), request_content_type(headers), None)
        .await?;
    record_response(StatusCode::OK, &record, false)
}

async fn store_delete(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    section: &Section,
) -> Result<Response, MockError> {
    let ids = extract::extract_ids(&Method::DELETE, path, headers, b"", section)?;
    if let Some(id) = ids.first() {
        match state.store.delete(id).await {
            Ok(()) => return Ok(StatusCode::NO_CONTENT.into_response()),
            Err(MockError::NotFound) => {}
            Err(e) => return Err(e),
        }
    }
    // Not a known ID: treat the path as a collection and cascade.
    let removed = state.store.delete_by_path(&base_path(path)).await;
    if removed > 0 {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(MockError::NotFound)
    }
}

fn record_response(
    status: StatusCode,
    record: &MockRecord,
    head: bool,
) -> Result<Response, MockError> {
    let mut builder = Response::builder().status(status);
    if !record.content_type.is_empty() {
        builder = builder.header(header::CONTENT_TYPE, record.content_type.as_str());
    }
    if let Some(location) = record.location.as_deref()
        && !location.is_empty()
    {
        builder = builder.header(header::LOCATION, location);
    }
    let body = if head { Vec::new() } else { record.body.clone() };
    builder
        .body(Body::from(body))
        .map_err(|e| MockError::Internal(format!("response build failed: {e}")))
}

fn request_content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Request path with the trailing slash stripped; `/` stays `/`.
fn base_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn join_location(base: &str, id: &str) -> String {
    if base == "/" {
        format!("/{id}")
    } else {
        format!("{base}/{id}")
    }
}
