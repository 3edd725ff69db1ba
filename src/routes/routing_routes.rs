use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::route_packet_dto::{
    GeocodeRequest, GeocodeResult, RoutePacketRequest, RoutePreviewRequest, RoutePreviewResponse,
};
use crate::models::{RoutePacket, Rider, VehicleTypeStats};
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, AppError, AppResult};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

pub fn create_routing_router() -> Router<AppState> {
    Router::new()
        .route("/route-packets", post(create_route_packet).get(list_route_packets))
        .route(
            "/route-packets/:id",
            get(get_route_packet).put(update_route_packet).delete(delete_route_packet),
        )
        .route("/statistics", get(statistics))
        .route("/route-preview", post(route_preview))
        .route("/riders", get(list_riders))
        .route("/geocode", post(geocode))
}

fn idempotency_key(headers: &HeaderMap) -> AppResult<Option<Uuid>> {
    headers
        .get(IDEMPOTENCY_HEADER)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|text| Uuid::parse_str(text.trim()).ok())
                .ok_or_else(|| bad_request_error("Idempotency-Key must be a UUID"))
        })
        .transpose()
}

async fn create_route_packet(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<RoutePacketRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoutePacket>), AppError> {
    let key = idempotency_key(&headers)?;
    let Json(request) = payload?;

    let outcome = state.packets.create(request.into_new_packet()?, key).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.packet)))
}

async fn list_route_packets(State(state): State<AppState>) -> Result<Json<Vec<RoutePacket>>, AppError> {
    Ok(Json(state.packets.list().await?))
}

async fn get_route_packet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoutePacket>, AppError> {
    Ok(Json(state.packets.get_by_id(id).await?))
}

async fn update_route_packet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<RoutePacketRequest>, JsonRejection>,
) -> Result<Json<RoutePacket>, AppError> {
    let Json(request) = payload?;
    Ok(Json(state.packets.update(id, request.into_new_packet()?).await?))
}

async fn delete_route_packet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.packets.delete(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Route packet deleted"
    })))
}

async fn statistics(State(state): State<AppState>) -> Result<Json<Vec<VehicleTypeStats>>, AppError> {
    Ok(Json(state.packets.statistics().await?))
}

async fn route_preview(
    State(state): State<AppState>,
    payload: Result<Json<RoutePreviewRequest>, JsonRejection>,
) -> Result<Json<RoutePreviewResponse>, AppError> {
    let Json(request) = payload?;
    let passengers = request.into_passengers()?;

    let route = state.planner.plan(&passengers).await?;
    Ok(Json(route.into()))
}

async fn list_riders(State(state): State<AppState>) -> Result<Json<Vec<Rider>>, AppError> {
    Ok(Json(state.riders.list().await?))
}

async fn geocode(
    State(state): State<AppState>,
    payload: Result<Json<GeocodeRequest>, JsonRejection>,
) -> Result<Json<Vec<GeocodeResult>>, AppError> {
    let Json(request) = payload?;
    request.validate()?;
    if request.addresses.iter().any(|address| address.trim().is_empty()) {
        return Err(bad_request_error("addresses must not be blank"));
    }

    let batch = state.planner.geocoder().resolve_all(&request.addresses).await;
    let results = request
        .addresses
        .iter()
        .filter_map(|address| {
            batch.get(address).map(|resolved| GeocodeResult {
                address: address.clone(),
                lat: resolved.coordinates.lat,
                lng: resolved.coordinates.lng,
                fallback: resolved.fallback,
            })
        })
        .collect();

    Ok(Json(results))
}
