use std::sync::Arc;

use axum::Json;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use clustering::{ClusterError, Viewport};
use foundation::LatLng;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::AppState;
use crate::sessions::SessionEntry;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

fn cluster_error(e: ClusterError) -> ApiError {
    let status = match &e {
        ClusterError::Data(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ClusterError::UnknownRegion(_) => StatusCode::NOT_FOUND,
        ClusterError::InvalidViewport(_) => StatusCode::BAD_REQUEST,
        ClusterError::InvariantViolation(_) | ClusterError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

fn lookup(state: &AppState, id: &str) -> Result<Arc<SessionEntry>, ApiError> {
    let id = Uuid::parse_str(id)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Invalid session id"))?;
    state
        .sessions
        .get(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "sessions": state.sessions.len() }))
}

pub async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let entry = state.sessions.create();
    (StatusCode::CREATED, Json(json!({ "id": entry.id().to_string() })))
}

pub async fn delete_session(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = lookup(&state, &id)?;
    state.sessions.remove(&entry.id());
    Ok((StatusCode::NO_CONTENT, ""))
}

/// Body: JSON array of point records.
pub async fn put_points(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let entry = lookup(&state, &id)?;
    let report = entry
        .session()
        .lock()
        .set_points_json(&body)
        .map_err(cluster_error)?;
    Ok(Json(json!({ "ingest": report })))
}

/// Body: GeoJSON FeatureCollection of Polygon/MultiPolygon features.
///
/// A rejected collection still takes effect: the session drops its regions
/// and clusters with the heat strategy until a valid collection arrives.
pub async fn put_regions(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let entry = lookup(&state, &id)?;
    let mut session = entry.session().lock();
    session.set_regions_geojson(&body).map_err(cluster_error)?;
    let regions = session.engine().regions().map(|r| r.len()).unwrap_or(0);
    Ok(Json(json!({ "regions": regions })))
}

pub async fn post_viewport(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(viewport): Json<Viewport>,
) -> Result<impl IntoResponse, ApiError> {
    viewport.validate().map_err(cluster_error)?;
    let entry = lookup(&state, &id)?;
    entry.viewport_changed(viewport);
    Ok((StatusCode::ACCEPTED, Json(json!({ "scheduled": true }))))
}

pub async fn post_decluster(
    State(state): State<AppState>,
    AxumPath((id, region)): AxumPath<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let entry = lookup(&state, &id)?;
    let bounds = entry
        .session()
        .lock()
        .decluster_region(&region)
        .map_err(cluster_error)?;
    Ok(Json(json!({ "region": region, "fit_bounds": bounds })))
}

pub async fn get_clusters(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Value>, ApiError> {
    let entry = lookup(&state, &id)?;
    let session = entry.session().lock();
    let engine = session.engine();
    Ok(Json(json!({
        "generation": engine.generation(),
        "tier": engine.tier(),
        "stats": engine.last_stats(),
        "clusters": engine.clusters(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct HitQuery {
    lat: f64,
    lng: f64,
    zoom: f64,
}

pub async fn get_hit(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(q): Query<HitQuery>,
) -> Result<Json<Value>, ApiError> {
    let entry = lookup(&state, &id)?;
    let session = entry.session().lock();
    let members = session
        .find_cluster_at(LatLng::new(q.lat, q.lng), q.zoom)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "No cluster at location"))?;
    Ok(Json(json!({ "members": members })))
}
