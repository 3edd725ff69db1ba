//! Rutas de borradores del builder de route packets
//!
//! Cada borrador es un `RoutePacketBuilder` propio. Las mutaciones se
//! aplican con el lock tomado; el cálculo de ruta se hace sin él y se
//! descarta si otra mutación llegó mientras tanto.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::draft_dto::{
    AddPassengerRequest, CreateDraftRequest, DraftResponse, MoveDirection, MoveRequest,
    SelectVehicleRequest, SetNameRequest,
};
use crate::models::RoutePacket;
use crate::services::route_packet_builder::{
    recompute_shared, BuilderError, BuilderState, RoutePacketBuilder, RouteRequest,
};
use crate::state::AppState;
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub fn create_draft_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_draft))
        .route("/:id", get(get_draft).delete(discard_draft))
        .route("/:id/vehicle", put(select_vehicle))
        .route("/:id/name", put(set_name))
        .route("/:id/passengers", post(add_passenger))
        .route("/:id/passengers/:rider_id", delete(remove_passenger))
        .route("/:id/passengers/:rider_id/move", post(move_passenger))
        .route("/:id/save", post(save_draft))
}

async fn respond(state: &AppState, id: Uuid) -> AppResult<Json<DraftResponse>> {
    let draft = state.draft(id).await?;
    let snapshot = draft.lock().await.snapshot();
    Ok(Json(DraftResponse { id, snapshot }))
}

/// Aplicar una mutación y recalcular la ruta resultante
async fn mutate<F>(state: &AppState, id: Uuid, mutation: F) -> AppResult<Json<DraftResponse>>
where
    F: FnOnce(&mut RoutePacketBuilder) -> Result<RouteRequest, BuilderError>,
{
    let draft = state.draft(id).await?;
    let request = {
        let mut builder = draft.lock().await;
        mutation(&mut *builder)?
    };
    recompute_shared(&draft, request).await;
    respond(state, id).await
}

async fn create_draft(
    State(state): State<AppState>,
    payload: Result<Json<CreateDraftRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DraftResponse>), AppError> {
    // sin body (ni content-type) se abre un borrador vacío
    let request = match payload {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => CreateDraftRequest::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let mut builder = RoutePacketBuilder::new(state.planner.clone());

    let route_request = match request.packet_id {
        Some(packet_id) => {
            let packet = state.packets.get_by_id(packet_id).await?;
            Some(builder.view_saved_packet(&packet)?)
        }
        None => {
            builder.start()?;
            None
        }
    };

    let (id, draft) = state.open_draft(builder).await;
    if let Some(route_request) = route_request {
        recompute_shared(&draft, route_request).await;
    }

    let response = respond(&state, id).await?;
    Ok((StatusCode::CREATED, response))
}

async fn get_draft(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<DraftResponse>> {
    respond(&state, id).await
}

/// Cancelar (o cerrar la vista de un packet guardado) y olvidar el borrador
async fn discard_draft(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    let draft = state.draft(id).await?;
    {
        let mut builder = draft.lock().await;
        if builder.state() == BuilderState::Saved {
            builder.close()?;
        } else {
            builder.cancel()?;
        }
    }
    state.discard_draft(id).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn select_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SelectVehicleRequest>, JsonRejection>,
) -> AppResult<Json<DraftResponse>> {
    let Json(request) = payload?;
    mutate(&state, id, |builder| builder.select_vehicle(request.vehicle_type)).await
}

async fn set_name(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SetNameRequest>, JsonRejection>,
) -> AppResult<Json<DraftResponse>> {
    let Json(request) = payload?;
    request.validate()?;

    let draft = state.draft(id).await?;
    draft.lock().await.set_name(&request.name)?;
    respond(&state, id).await
}

async fn add_passenger(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<AddPassengerRequest>, JsonRejection>,
) -> AppResult<Json<DraftResponse>> {
    let Json(request) = payload?;
    let rider = state
        .riders
        .find_by_id(request.rider_id)
        .await?
        .ok_or_else(|| not_found_error("Rider", &request.rider_id.to_string()))?;

    mutate(&state, id, |builder| builder.add_passenger(&rider)).await
}

async fn remove_passenger(
    State(state): State<AppState>,
    Path((id, rider_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<DraftResponse>> {
    mutate(&state, id, |builder| builder.remove_passenger(rider_id)).await
}

async fn move_passenger(
    State(state): State<AppState>,
    Path((id, rider_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> AppResult<Json<DraftResponse>> {
    let Json(request) = payload?;
    mutate(&state, id, |builder| match request.direction {
        MoveDirection::Up => builder.move_up(rider_id),
        MoveDirection::Down => builder.move_down(rider_id),
    })
    .await
}

async fn save_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<RoutePacket>), AppError> {
    let draft = state.draft(id).await?;
    let packet = {
        let mut builder = draft.lock().await;
        builder.save(&state.packets).await?
    };

    state.discard_draft(id).await;
    Ok((StatusCode::CREATED, Json(packet)))
}
