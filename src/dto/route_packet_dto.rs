//! DTOs de route packets
//!
//! Formas de request/response de la API `/routing`. Los requests se
//! validan aquí (`validator`) antes de construir un `NewRoutePacket`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    NewRoutePacket, PassengerInRoute, RouteDetails, VehicleType, Waypoint,
};
use crate::services::directions_service::RouteLeg;
use crate::services::route_planner::{PassengerLegs, PlannedRoute};
use crate::utils::errors::{validation_error, AppError, AppResult};
use crate::utils::units::{parse_distance_meters, parse_duration_seconds};
use crate::utils::validation::validate_not_blank;

/// Pasajero tal como llega en el body
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PassengerRequest {
    pub rider_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub phone: String,

    #[validate(custom = "validate_not_blank")]
    pub pickup_location: String,

    #[validate(custom = "validate_not_blank")]
    pub drop_location: String,

    pub order: usize,
}

impl From<PassengerRequest> for PassengerInRoute {
    fn from(request: PassengerRequest) -> Self {
        Self {
            rider_id: request.rider_id,
            name: request.name,
            email: request.email,
            phone: request.phone,
            pickup_location: request.pickup_location,
            drop_location: request.drop_location,
            order: request.order,
        }
    }
}

/// Detalles de ruta enviados por el cliente. Los campos numéricos son
/// opcionales; si faltan se derivan de los textos.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDetailsRequest {
    pub total_distance: String,
    pub total_time: String,
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

impl RouteDetailsRequest {
    fn into_details(self) -> AppResult<RouteDetails> {
        let distance_meters = match self.distance_meters {
            Some(meters) => meters,
            None => parse_distance_meters(&self.total_distance).ok_or_else(|| {
                validation_error("totalDistance", "expected a distance like '10.0 km'")
            })?,
        };
        let duration_seconds = match self.duration_seconds {
            Some(seconds) => seconds,
            None => parse_duration_seconds(&self.total_time).ok_or_else(|| {
                validation_error("totalTime", "expected a duration like '20 mins'")
            })?,
        };

        if distance_meters < 0.0 || duration_seconds < 0.0 {
            return Err(validation_error("routeDetails", "distance and time must not be negative"));
        }

        Ok(RouteDetails {
            total_distance: self.total_distance,
            total_time: self.total_time,
            distance_meters,
            duration_seconds,
            waypoints: self.waypoints,
        })
    }
}

/// Body de `POST` y `PUT /routing/route-packets`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoutePacketRequest {
    #[validate(length(min = 1, max = 200), custom = "validate_not_blank")]
    pub name: String,

    pub vehicle_type: VehicleType,

    #[validate]
    pub passengers: Vec<PassengerRequest>,

    pub route_details: RouteDetailsRequest,
}

impl RoutePacketRequest {
    /// Validar forma y convertir a modelo. Las reglas del packet
    /// (capacidad, orden contiguo...) se comprueban en el controlador.
    pub fn into_new_packet(self) -> AppResult<NewRoutePacket> {
        self.validate()?;

        Ok(NewRoutePacket {
            name: self.name.trim().to_string(),
            vehicle_type: self.vehicle_type,
            passengers: self.passengers.into_iter().map(PassengerInRoute::from).collect(),
            route_details: self.route_details.into_details()?,
        })
    }
}

/// Body de `POST /routing/route-preview`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoutePreviewRequest {
    #[validate]
    pub passengers: Vec<PassengerRequest>,
}

impl RoutePreviewRequest {
    pub fn into_passengers(self) -> AppResult<Vec<PassengerInRoute>> {
        self.validate()?;
        if self.passengers.is_empty() {
            return Err(validation_error("passengers", "at least one passenger is required"));
        }
        Ok(self.passengers.into_iter().map(PassengerInRoute::from).collect())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePreviewResponse {
    pub route_details: RouteDetails,
    pub legs: Vec<RouteLeg>,
    pub passenger_legs: Vec<PassengerLegs>,
    pub fallback_addresses: Vec<String>,
}

impl From<PlannedRoute> for RoutePreviewResponse {
    fn from(route: PlannedRoute) -> Self {
        Self {
            route_details: route.route_details,
            legs: route.legs,
            passenger_legs: route.passenger_legs,
            fallback_addresses: route.fallback_addresses,
        }
    }
}

/// Body de `POST /routing/geocode`
#[derive(Debug, Deserialize, Validate)]
pub struct GeocodeRequest {
    #[validate(length(max = 50))]
    pub addresses: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GeocodeResult {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub fallback: bool,
}
