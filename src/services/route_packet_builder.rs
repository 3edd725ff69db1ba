//! Builder de route packets
//!
//! Máquina de estados de una sesión de edición:
//! `Idle → VehicleSelection → Accumulating → Ready → Saved`.
//!
//! Cada mutación de la lista de pasajeros incrementa `generation` y
//! devuelve un [`RouteRequest`]. La ruta se calcula fuera del builder y se
//! aplica con [`RoutePacketBuilder::apply_route`], que descarta respuestas
//! de generaciones anteriores.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::controllers::RoutePacketController;
use crate::models::{renumber, NewRoutePacket, PassengerInRoute, Rider, RoutePacket, VehicleType};
use crate::services::route_planner::{PlannedRoute, RoutePlanner, RoutingError};
use crate::utils::errors::{bad_request_error, capacity_error, not_found_error, validation_error, AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BuilderState {
    Idle,
    VehicleSelection,
    Accumulating,
    Ready,
    Saved,
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("operation '{operation}' is not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: BuilderState,
    },

    #[error("select a vehicle type first")]
    VehicleNotSelected,

    #[error("a {vehicle_type} vehicle carries at most {capacity} passengers")]
    CapacityExceeded { vehicle_type: VehicleType, capacity: usize },

    #[error("rider {0} is already in this route packet")]
    DuplicatePassenger(Uuid),

    #[error("rider {0} is not in this route packet")]
    PassengerNotFound(Uuid),

    #[error("passenger cannot move further in that direction")]
    CannotMove,

    #[error("a name is required before saving")]
    NameRequired,

    #[error("addresses could not be geocoded: {}", .0.join(", "))]
    UnresolvedAddresses(Vec<String>),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("route packet could not be saved: {0}")]
    Store(AppError),
}

impl From<BuilderError> for AppError {
    fn from(error: BuilderError) -> Self {
        match error {
            BuilderError::InvalidState { .. } => AppError::Conflict(error.to_string()),
            BuilderError::CapacityExceeded {
                vehicle_type,
                capacity,
            } => capacity_error(vehicle_type.as_str(), capacity, capacity + 1),
            BuilderError::PassengerNotFound(id) => not_found_error("Passenger", &id.to_string()),
            BuilderError::NameRequired => validation_error("name", &error.to_string()),
            BuilderError::UnresolvedAddresses(_) => validation_error("passengers", &error.to_string()),
            BuilderError::Routing(e) => e.into(),
            BuilderError::Store(e) => e,
            BuilderError::VehicleNotSelected
            | BuilderError::DuplicatePassenger(_)
            | BuilderError::CannotMove => bad_request_error(&error.to_string()),
        }
    }
}

/// Petición de cálculo de ruta emitida por una mutación
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub generation: u64,
    pub passengers: Vec<PassengerInRoute>,
}

/// Efecto de aplicar el resultado de un cálculo de ruta
#[derive(Debug, Clone, PartialEq)]
pub enum RouteUpdate {
    Updated,
    /// La lista cambió desde que se pidió la ruta; resultado descartado
    Stale,
    /// Ruta no disponible; se mantiene la ruta anterior
    Unavailable(String),
    /// Ruta no disponible al ver un packet guardado; se limpia la ruta
    Cleared,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderSnapshot {
    pub state: BuilderState,
    pub vehicle_type: Option<VehicleType>,
    pub capacity: Option<usize>,
    pub name: Option<String>,
    pub passengers: Vec<PassengerInRoute>,
    pub route: Option<PlannedRoute>,
    pub route_error: Option<String>,
    pub generation: u64,
    pub can_save: bool,
    pub saved_packet_id: Option<Uuid>,
}

pub struct RoutePacketBuilder {
    planner: Arc<RoutePlanner>,
    state: BuilderState,
    vehicle_type: Option<VehicleType>,
    name: Option<String>,
    passengers: Vec<PassengerInRoute>,
    route: Option<PlannedRoute>,
    route_error: Option<String>,
    generation: u64,
    idempotency_key: Uuid,
    saved_packet_id: Option<Uuid>,
}

impl RoutePacketBuilder {
    pub fn new(planner: Arc<RoutePlanner>) -> Self {
        Self {
            planner,
            state: BuilderState::Idle,
            vehicle_type: None,
            name: None,
            passengers: Vec::new(),
            route: None,
            route_error: None,
            generation: 0,
            idempotency_key: Uuid::new_v4(),
            saved_packet_id: None,
        }
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn passengers(&self) -> &[PassengerInRoute] {
        &self.passengers
    }

    pub fn route(&self) -> Option<&PlannedRoute> {
        self.route.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn planner(&self) -> &Arc<RoutePlanner> {
        &self.planner
    }

    /// Abrir una sesión nueva
    pub fn start(&mut self) -> Result<(), BuilderError> {
        self.require(&[BuilderState::Idle], "start")?;
        self.state = BuilderState::VehicleSelection;
        Ok(())
    }

    /// Elegir vehículo. Siempre vacía la lista de pasajeros.
    pub fn select_vehicle(&mut self, vehicle_type: VehicleType) -> Result<RouteRequest, BuilderError> {
        self.require(
            &[BuilderState::VehicleSelection, BuilderState::Accumulating, BuilderState::Ready],
            "select_vehicle",
        )?;

        if !self.passengers.is_empty() {
            log::info!("🔄 Vehicle changed to {}, clearing {} passengers", vehicle_type, self.passengers.len());
        }
        self.vehicle_type = Some(vehicle_type);
        self.passengers.clear();
        self.route = None;
        self.route_error = None;
        Ok(self.passengers_changed())
    }

    pub fn add_passenger(&mut self, rider: &Rider) -> Result<RouteRequest, BuilderError> {
        let vehicle_type = self.editable_vehicle("add_passenger")?;

        if self.position_of(rider.id).is_some() {
            return Err(BuilderError::DuplicatePassenger(rider.id));
        }
        let capacity = vehicle_type.capacity();
        if self.passengers.len() >= capacity {
            return Err(BuilderError::CapacityExceeded {
                vehicle_type,
                capacity,
            });
        }

        let order = self.passengers.len();
        self.passengers.push(PassengerInRoute::from_rider(rider, order));
        Ok(self.passengers_changed())
    }

    pub fn remove_passenger(&mut self, rider_id: Uuid) -> Result<RouteRequest, BuilderError> {
        self.editable_vehicle("remove_passenger")?;
        let index = self
            .position_of(rider_id)
            .ok_or(BuilderError::PassengerNotFound(rider_id))?;

        self.passengers.remove(index);
        renumber(&mut self.passengers);
        Ok(self.passengers_changed())
    }

    pub fn move_up(&mut self, rider_id: Uuid) -> Result<RouteRequest, BuilderError> {
        self.editable_vehicle("move_up")?;
        let index = self
            .position_of(rider_id)
            .ok_or(BuilderError::PassengerNotFound(rider_id))?;
        if index == 0 {
            return Err(BuilderError::CannotMove);
        }

        self.passengers.swap(index - 1, index);
        renumber(&mut self.passengers);
        Ok(self.passengers_changed())
    }

    pub fn move_down(&mut self, rider_id: Uuid) -> Result<RouteRequest, BuilderError> {
        self.editable_vehicle("move_down")?;
        let index = self
            .position_of(rider_id)
            .ok_or(BuilderError::PassengerNotFound(rider_id))?;
        if index + 1 >= self.passengers.len() {
            return Err(BuilderError::CannotMove);
        }

        self.passengers.swap(index, index + 1);
        renumber(&mut self.passengers);
        Ok(self.passengers_changed())
    }

    /// Nombre vacío o en blanco borra el nombre
    pub fn set_name(&mut self, name: &str) -> Result<(), BuilderError> {
        self.require(
            &[BuilderState::VehicleSelection, BuilderState::Accumulating, BuilderState::Ready],
            "set_name",
        )?;
        let trimmed = name.trim();
        self.name = (!trimmed.is_empty()).then(|| trimmed.to_string());
        Ok(())
    }

    /// Descartar la sesión. No se permite desde `Saved`.
    pub fn cancel(&mut self) -> Result<(), BuilderError> {
        if self.state == BuilderState::Saved {
            return Err(BuilderError::InvalidState {
                operation: "cancel",
                state: self.state,
            });
        }
        log::info!("🚫 Route packet draft cancelled ({} passengers discarded)", self.passengers.len());
        self.reset();
        Ok(())
    }

    /// Mostrar un packet guardado y recalcular su ruta
    pub fn view_saved_packet(&mut self, packet: &RoutePacket) -> Result<RouteRequest, BuilderError> {
        self.require(&[BuilderState::Idle, BuilderState::Saved], "view_saved_packet")?;

        self.state = BuilderState::Saved;
        self.vehicle_type = Some(packet.vehicle_type);
        self.name = Some(packet.name.clone());
        self.passengers = packet.passengers.clone();
        self.passengers.sort_by_key(|p| p.order);
        self.route = None;
        self.route_error = None;
        self.saved_packet_id = Some(packet.id);
        self.generation += 1;

        Ok(self.route_request())
    }

    /// Salir de la vista de un packet guardado
    pub fn close(&mut self) -> Result<(), BuilderError> {
        self.require(&[BuilderState::Saved], "close")?;
        self.reset();
        Ok(())
    }

    /// Petición para la lista actual
    pub fn route_request(&self) -> RouteRequest {
        RouteRequest {
            generation: self.generation,
            passengers: self.passengers.clone(),
        }
    }

    /// Aplicar un resultado de ruta si sigue siendo de la generación actual
    pub fn apply_route(&mut self, generation: u64, outcome: Result<PlannedRoute, RoutingError>) -> RouteUpdate {
        if generation != self.generation {
            log::debug!(
                "⏭️ Discarding stale route (generation {}, current {})",
                generation,
                self.generation
            );
            return RouteUpdate::Stale;
        }

        match outcome {
            Ok(route) => {
                self.route = Some(route);
                self.route_error = None;
                RouteUpdate::Updated
            }
            Err(e) if self.state == BuilderState::Saved => {
                log::warn!("⚠️ Saved route packet route unavailable, clearing display: {}", e);
                self.route = None;
                self.route_error = Some(e.to_string());
                RouteUpdate::Cleared
            }
            Err(e) => {
                log::warn!("⚠️ Route unavailable, keeping previous route: {}", e);
                self.route_error = Some(e.to_string());
                RouteUpdate::Unavailable(e.to_string())
            }
        }
    }

    /// Calcular y aplicar la ruta de la lista actual
    pub async fn recompute(&mut self) -> RouteUpdate {
        let request = self.route_request();
        let outcome = self.planner.plan(&request.passengers).await;
        self.apply_route(request.generation, outcome)
    }

    /// Guardar el packet con la ruta recalculada en el orden actual.
    /// Si falla, el builder vuelve a `Ready` con sus datos intactos.
    pub async fn save(&mut self, store: &RoutePacketController) -> Result<RoutePacket, BuilderError> {
        self.require(&[BuilderState::Ready], "save")?;
        let vehicle_type = self.vehicle_type.ok_or(BuilderError::VehicleNotSelected)?;
        let name = self.name.clone().ok_or(BuilderError::NameRequired)?;

        self.state = BuilderState::Saved;
        match self.persist(store, vehicle_type, name).await {
            Ok(packet) => {
                log::info!("💾 Draft saved as route packet {}", packet.id);
                self.reset();
                Ok(packet)
            }
            Err(e) => {
                log::warn!("⚠️ Save failed, draft kept for retry: {}", e);
                self.state = BuilderState::Ready;
                Err(e)
            }
        }
    }

    async fn persist(
        &mut self,
        store: &RoutePacketController,
        vehicle_type: VehicleType,
        name: String,
    ) -> Result<RoutePacket, BuilderError> {
        let route = self.planner.plan(&self.passengers).await?;
        if route.uses_fallback() {
            return Err(BuilderError::UnresolvedAddresses(route.fallback_addresses));
        }
        self.route = Some(route.clone());
        self.route_error = None;

        let packet = NewRoutePacket {
            name,
            vehicle_type,
            passengers: self.passengers.clone(),
            route_details: route.route_details,
        };
        let outcome = store
            .create(packet, Some(self.idempotency_key))
            .await
            .map_err(BuilderError::Store)?;
        Ok(outcome.packet)
    }

    pub fn snapshot(&self) -> BuilderSnapshot {
        BuilderSnapshot {
            state: self.state,
            vehicle_type: self.vehicle_type,
            capacity: self.vehicle_type.map(|v| v.capacity()),
            name: self.name.clone(),
            passengers: self.passengers.clone(),
            route: self.route.clone(),
            route_error: self.route_error.clone(),
            generation: self.generation,
            can_save: self.state == BuilderState::Ready && self.name.is_some(),
            saved_packet_id: self.saved_packet_id,
        }
    }

    fn require(&self, allowed: &[BuilderState], operation: &'static str) -> Result<(), BuilderError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(BuilderError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn editable_vehicle(&self, operation: &'static str) -> Result<VehicleType, BuilderError> {
        match self.state {
            BuilderState::VehicleSelection => Err(BuilderError::VehicleNotSelected),
            BuilderState::Accumulating | BuilderState::Ready => {
                self.vehicle_type.ok_or(BuilderError::VehicleNotSelected)
            }
            state => Err(BuilderError::InvalidState { operation, state }),
        }
    }

    fn position_of(&self, rider_id: Uuid) -> Option<usize> {
        self.passengers.iter().position(|p| p.rider_id == rider_id)
    }

    fn passengers_changed(&mut self) -> RouteRequest {
        self.state = if self.passengers.is_empty() {
            BuilderState::Accumulating
        } else {
            BuilderState::Ready
        };
        self.generation += 1;
        self.route_request()
    }

    fn reset(&mut self) {
        self.state = BuilderState::Idle;
        self.vehicle_type = None;
        self.name = None;
        self.passengers.clear();
        self.route = None;
        self.route_error = None;
        self.saved_packet_id = None;
        self.idempotency_key = Uuid::new_v4();
        // invalida cualquier cálculo en curso
        self.generation += 1;
    }
}

/// Aplicar una petición de ruta sobre un builder compartido sin mantener
/// el lock mientras se consulta la Directions API
pub async fn recompute_shared(builder: &Mutex<RoutePacketBuilder>, request: RouteRequest) -> RouteUpdate {
    let planner = builder.lock().await.planner().clone();
    let outcome = planner.plan(&request.passengers).await;
    builder.lock().await.apply_route(request.generation, outcome)
}
