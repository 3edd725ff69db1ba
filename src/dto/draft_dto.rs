//! DTOs de borradores del builder (`/routing/drafts`)

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::VehicleType;
use crate::services::route_packet_builder::BuilderSnapshot;

/// Body opcional de `POST /routing/drafts`. Con `packetId` el borrador
/// muestra un packet guardado en lugar de empezar uno nuevo.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDraftRequest {
    pub packet_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectVehicleRequest {
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPassengerRequest {
    pub rider_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub direction: MoveDirection,
}

/// Un nombre vacío borra el nombre del borrador
#[derive(Debug, Deserialize, Validate)]
pub struct SetNameRequest {
    #[validate(length(max = 200))]
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub snapshot: BuilderSnapshot,
}
