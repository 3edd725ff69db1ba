//! Modelo de RoutePacket
//!
//! Un route packet es la asignación nombrada de pasajeros a un vehículo
//! junto con la ruta precalculada (pickups primero, luego drops).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::rider::Rider;

/// Tipo de vehículo - limita la capacidad de pasajeros
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VehicleType {
    #[serde(rename = "5-seater")]
    FiveSeater,
    #[serde(rename = "7-seater")]
    SevenSeater,
}

impl VehicleType {
    /// Número máximo de pasajeros (el conductor ocupa un asiento)
    pub fn capacity(&self) -> usize {
        match self {
            VehicleType::FiveSeater => 4,
            VehicleType::SevenSeater => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::FiveSeater => "5-seater",
            VehicleType::SevenSeater => "7-seater",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5-seater" => Ok(VehicleType::FiveSeater),
            "7-seater" => Ok(VehicleType::SevenSeater),
            other => Err(format!("unknown vehicle type '{}'", other)),
        }
    }
}

/// Pasajero dentro de un route packet
///
/// `name`, `email` y `phone` son una copia tomada al guardar; `order` es la
/// posición de recogida (el orden de bajada lo replica).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassengerInRoute {
    pub rider_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub pickup_location: String,
    pub drop_location: String,
    pub order: usize,
}

impl PassengerInRoute {
    pub fn from_rider(rider: &Rider, order: usize) -> Self {
        Self {
            rider_id: rider.id,
            name: rider.name.clone(),
            email: rider.email.clone(),
            phone: rider.phone.clone(),
            pickup_location: rider.pickup_location.clone(),
            drop_location: rider.drop_location.clone(),
            order,
        }
    }

    /// Refrescar los campos de presentación desde el directorio de riders
    pub fn expand_with(&mut self, rider: &Rider) {
        self.name = rider.name.clone();
        self.email = rider.email.clone();
        self.phone = rider.phone.clone();
    }
}

/// Tipo de parada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointType {
    Pickup,
    Drop,
}

/// Parada de la ruta calculada, en orden de visita
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub waypoint_type: WaypointType,
    pub rider_id: Uuid,
    pub order: usize,
}

/// Resultado de ruta persistido con el packet
///
/// `total_distance`/`total_time` son textos de presentación; los campos
/// numéricos (metros, segundos) son los que se agregan en estadísticas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteDetails {
    pub total_distance: String,
    pub total_time: String,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

/// RoutePacket principal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePacket {
    pub id: Uuid,
    pub name: String,
    pub vehicle_type: VehicleType,
    pub passengers: Vec<PassengerInRoute>,
    pub route_details: RouteDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Packet ya validado, sin los campos generados por el store
#[derive(Debug, Clone, PartialEq)]
pub struct NewRoutePacket {
    pub name: String,
    pub vehicle_type: VehicleType,
    pub passengers: Vec<PassengerInRoute>,
    pub route_details: RouteDetails,
}

/// Violaciones de las invariantes de un packet
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PacketRuleViolation {
    #[error("name must not be empty")]
    EmptyName,
    #[error("route packet needs at least one passenger")]
    NoPassengers,
    #[error("a {vehicle_type} vehicle carries at most {capacity} passengers, got {requested}")]
    CapacityExceeded {
        vehicle_type: VehicleType,
        capacity: usize,
        requested: usize,
    },
    #[error("rider {0} appears more than once")]
    DuplicateRider(Uuid),
    #[error("passenger order values must be contiguous 0..{0}")]
    NonContiguousOrder(usize),
    #[error("expected {expected} waypoints, got {actual}")]
    WaypointCount { expected: usize, actual: usize },
    #[error("waypoint {index} must be the {expected:?} of rider {rider_id} (order {order})")]
    WaypointShape {
        index: usize,
        expected: WaypointType,
        rider_id: Uuid,
        order: usize,
    },
}

impl NewRoutePacket {
    /// Comprobar capacidad, nombre, unicidad de riders, orden contiguo y
    /// forma de los waypoints
    pub fn check_rules(&self) -> Result<(), PacketRuleViolation> {
        if self.name.trim().is_empty() {
            return Err(PacketRuleViolation::EmptyName);
        }
        if self.passengers.is_empty() {
            return Err(PacketRuleViolation::NoPassengers);
        }

        let capacity = self.vehicle_type.capacity();
        if self.passengers.len() > capacity {
            return Err(PacketRuleViolation::CapacityExceeded {
                vehicle_type: self.vehicle_type,
                capacity,
                requested: self.passengers.len(),
            });
        }

        let mut seen = HashSet::new();
        for passenger in &self.passengers {
            if !seen.insert(passenger.rider_id) {
                return Err(PacketRuleViolation::DuplicateRider(passenger.rider_id));
            }
        }

        if !has_contiguous_order(&self.passengers) {
            return Err(PacketRuleViolation::NonContiguousOrder(self.passengers.len()));
        }

        let waypoints = self.route_details.waypoints.len();
        if waypoints != 0 && waypoints != 2 * self.passengers.len() {
            return Err(PacketRuleViolation::WaypointCount {
                expected: 2 * self.passengers.len(),
                actual: waypoints,
            });
        }
        if waypoints > 0 {
            self.check_waypoint_shape()?;
        }

        Ok(())
    }

    /// Los primeros `n` waypoints son los pickups en `order`, los `n`
    /// siguientes los drops en el mismo orden
    fn check_waypoint_shape(&self) -> Result<(), PacketRuleViolation> {
        let mut ordered: Vec<&PassengerInRoute> = self.passengers.iter().collect();
        ordered.sort_by_key(|p| p.order);

        let expected = ordered
            .iter()
            .map(|p| (WaypointType::Pickup, *p))
            .chain(ordered.iter().map(|p| (WaypointType::Drop, *p)));

        for (index, ((waypoint_type, passenger), waypoint)) in
            expected.zip(&self.route_details.waypoints).enumerate()
        {
            if waypoint.waypoint_type != waypoint_type
                || waypoint.rider_id != passenger.rider_id
                || waypoint.order != passenger.order
            {
                return Err(PacketRuleViolation::WaypointShape {
                    index,
                    expected: waypoint_type,
                    rider_id: passenger.rider_id,
                    order: passenger.order,
                });
            }
        }
        Ok(())
    }

    /// Dejar los pasajeros ordenados por `order`
    pub fn sort_passengers(&mut self) {
        self.passengers.sort_by_key(|p| p.order);
    }

    pub fn into_packet(self, id: Uuid, now: DateTime<Utc>) -> RoutePacket {
        RoutePacket {
            id,
            name: self.name,
            vehicle_type: self.vehicle_type,
            passengers: self.passengers,
            route_details: self.route_details,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `order` es una permutación de `0..n`
pub fn has_contiguous_order(passengers: &[PassengerInRoute]) -> bool {
    let mut orders: Vec<usize> = passengers.iter().map(|p| p.order).collect();
    orders.sort_unstable();
    orders.iter().enumerate().all(|(i, order)| i == *order)
}

/// Reasignar `order` según la posición actual en la lista
pub fn renumber(passengers: &mut [PassengerInRoute]) {
    for (index, passenger) in passengers.iter_mut().enumerate() {
        passenger.order = index;
    }
}

/// Fila agregada por tipo de vehículo
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleTypeStats {
    pub vehicle_type: VehicleType,
    pub count: i64,
    pub total_distance_km: f64,
    pub total_time_minutes: f64,
    pub average_passengers: f64,
}
