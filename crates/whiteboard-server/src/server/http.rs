//! HTTP API front end.
//!
//! Stateless handlers over the session registry. Every handler runs to
//! completion against the addressed session; bodies are parsed by hand so
//! that malformed JSON surfaces as the uniform `{"error": ...}` shape rather
//! than the framework rejection.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::ws;
use crate::error::{ApiError, ApiResult, ValidationError};
use crate::id;
use crate::registry::SessionRegistry;
use crate::session::Origin;
use crate::validate;

/// Shared state for HTTP and WebSocket handlers.
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

/// Create the router serving both protocol surfaces.
pub fn create_router(registry: Arc<SessionRegistry>) -> Router {
    let state = Arc::new(AppState { registry });

    Router::new()
        .route("/", get(root_redirect))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/sessions/{id}", get(session_info))
        .route(
            "/api/sessions/{id}/elements",
            get(list_elements).post(create_element).delete(clear_elements),
        )
        .route("/api/sessions/{id}/elements/batch", post(create_batch))
        .route(
            "/api/sessions/{id}/elements/{eid}",
            get(get_element).put(update_element).delete(delete_element),
        )
        .route("/ws", get(ws::ws_handler))
        .route("/{id}", get(client_page))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "whiteboard-server",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sessions = state.registry.loaded_count().await;
    Json(json!({
        "status": "ready",
        "service": "whiteboard-server",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": sessions
    }))
}

/// Mint a session and send the browser to its client page.
async fn root_redirect(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let session_id = id::session_token();
    state.registry.get_or_create(&session_id).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, format!("/{session_id}"))]))
}

/// The in-browser rendering client. Its logic lives entirely client-side;
/// the server only owns this route.
async fn client_page(Path(_id): Path<String>) -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

async fn session_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let handle = state
        .registry
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::session_not_found(&id))?;
    let snapshot = handle.snapshot().await?;

    Ok(Json(json!({
        "id": snapshot.id,
        "elementCount": snapshot.elements.len(),
        "elements": snapshot.elements,
        "userCount": snapshot.user_count,
        "createdAt": snapshot.created_at
    })))
}

async fn list_elements(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let handle = state
        .registry
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::session_not_found(&id))?;
    let snapshot = handle.snapshot().await?;
    Ok(Json(snapshot.elements))
}

async fn get_element(
    State(state): State<Arc<AppState>>,
    Path((id, eid)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let handle = state
        .registry
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::session_not_found(&id))?;
    let snapshot = handle.snapshot().await?;

    let element = snapshot
        .elements
        .into_iter()
        .find(|el| el.id() == Some(eid.as_str()))
        .ok_or_else(|| ApiError::element_not_found(&eid))?;
    Ok(Json(element))
}

async fn create_element(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let element = validate::element(parse_json(&body)?)?;

    let handle = state.registry.get_or_create(&id).await?;
    let stored = handle.create(element, Origin::Api).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn create_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let elements = validate::batch(parse_json(&body)?)?;

    let handle = state.registry.get_or_create(&id).await?;
    let stored = handle.create_batch(elements, Origin::Api).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn update_element(
    State(state): State<Arc<AppState>>,
    Path((id, eid)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let Value::Object(patch) = parse_json(&body)? else {
        return Err(ValidationError::NotAnObject.into());
    };

    let handle = state.registry.get_or_create(&id).await?;
    let merged = handle.update(eid, patch, Origin::Api).await?;
    Ok(Json(merged))
}

async fn delete_element(
    State(state): State<Arc<AppState>>,
    Path((id, eid)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let handle = state.registry.get_or_create(&id).await?;
    handle.delete(eid, Origin::Api).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_elements(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let handle = state.registry.get_or_create(&id).await?;
    handle.clear(Origin::Api).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_json(body: &[u8]) -> ApiResult<Value> {
    serde_json::from_slice(body).map_err(|e| ValidationError::Json(e).into())
}
