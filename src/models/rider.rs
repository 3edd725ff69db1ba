//! Modelo de Rider
//!
//! Directorio de pasajeros (tabla `riders`), de solo lectura para el
//! subsistema de routing.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Rider candidato para un route packet
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub pickup_location: String,
    pub drop_location: String,
}
