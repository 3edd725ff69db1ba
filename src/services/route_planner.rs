//! Planificador de rutas de route packets
//!
//! Dada la lista de pasajeros, construye la secuencia fija
//! `[pickup_0 .. pickup_n-1, drop_0 .. drop_n-1]`, geocodifica las
//! direcciones a través del cache y pide la ruta a la Directions API sin
//! reordenar paradas.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Coordinates, PassengerInRoute, RouteDetails, Waypoint, WaypointType};
use crate::services::directions_service::{
    DirectionsError, DirectionsProvider, DirectionsRequest, RouteLeg,
};
use crate::services::geocode_cache::GeocodeCache;
use crate::utils::errors::AppError;
use crate::utils::units::{format_distance, format_duration};

/// Errores al calcular una ruta
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("route unavailable: {0}")]
    Directions(#[from] DirectionsError),

    #[error("directions request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<RoutingError> for AppError {
    fn from(error: RoutingError) -> Self {
        match error {
            RoutingError::Timeout(_) => AppError::Timeout(error.to_string()),
            RoutingError::Directions(_) => AppError::ExternalApi(error.to_string()),
        }
    }
}

/// Parada de la secuencia pickup-then-drop, antes de geocodificar
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStop<'a> {
    pub passenger: &'a PassengerInRoute,
    pub waypoint_type: WaypointType,
}

impl RouteStop<'_> {
    pub fn address(&self) -> &str {
        match self.waypoint_type {
            WaypointType::Pickup => &self.passenger.pickup_location,
            WaypointType::Drop => &self.passenger.drop_location,
        }
    }
}

/// Ordenar por `order` y emitir todos los pickups y después todos los drops
pub fn build_stop_sequence(passengers: &[PassengerInRoute]) -> Vec<RouteStop<'_>> {
    let mut ordered: Vec<&PassengerInRoute> = passengers.iter().collect();
    ordered.sort_by_key(|p| p.order);

    let pickups = ordered.iter().copied().map(|passenger| RouteStop {
        passenger,
        waypoint_type: WaypointType::Pickup,
    });
    let drops = ordered.iter().copied().map(|passenger| RouteStop {
        passenger,
        waypoint_type: WaypointType::Drop,
    });

    pickups.chain(drops).collect()
}

/// Tramos atribuidos a un pasajero: el tramo que *llega* a su pickup y a su drop.
/// El pickup del primer pasajero es el origen y no tiene tramo de llegada.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerLegs {
    pub rider_id: Uuid,
    pub order: usize,
    pub pickup_leg: Option<RouteLeg>,
    pub drop_leg: Option<RouteLeg>,
}

/// Atribuir tramos a pasajeros para `n` pasajeros ordenados
pub fn attribute_legs(passengers: &[&PassengerInRoute], legs: &[RouteLeg]) -> Vec<PassengerLegs> {
    let n = passengers.len();
    passengers
        .iter()
        .enumerate()
        .map(|(k, passenger)| PassengerLegs {
            rider_id: passenger.rider_id,
            order: passenger.order,
            pickup_leg: k.checked_sub(1).and_then(|i| legs.get(i)).copied(),
            drop_leg: legs.get(n + k - 1).copied(),
        })
        .collect()
}

/// Ruta calculada para una lista de pasajeros
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRoute {
    pub route_details: RouteDetails,
    pub legs: Vec<RouteLeg>,
    pub passenger_legs: Vec<PassengerLegs>,
    pub fallback_addresses: Vec<String>,
}

impl PlannedRoute {
    pub fn empty() -> Self {
        Self {
            route_details: RouteDetails {
                total_distance: format_distance(0.0),
                total_time: format_duration(0.0),
                distance_meters: 0.0,
                duration_seconds: 0.0,
                waypoints: Vec::new(),
            },
            legs: Vec::new(),
            passenger_legs: Vec::new(),
            fallback_addresses: Vec::new(),
        }
    }

    pub fn uses_fallback(&self) -> bool {
        !self.fallback_addresses.is_empty()
    }
}

pub struct RoutePlanner {
    geocoder: Arc<GeocodeCache>,
    directions: Arc<dyn DirectionsProvider>,
    timeout: Duration,
}

impl RoutePlanner {
    pub fn new(geocoder: Arc<GeocodeCache>, directions: Arc<dyn DirectionsProvider>, timeout: Duration) -> Self {
        Self {
            geocoder,
            directions,
            timeout,
        }
    }

    pub fn geocoder(&self) -> &Arc<GeocodeCache> {
        &self.geocoder
    }

    /// Calcular la ruta completa de los pasajeros en su `order` actual
    pub async fn plan(&self, passengers: &[PassengerInRoute]) -> Result<PlannedRoute, RoutingError> {
        if passengers.is_empty() {
            return Ok(PlannedRoute::empty());
        }

        let stops = build_stop_sequence(passengers);
        let batch = self.geocoder.resolve_all(stops.iter().map(RouteStop::address)).await;

        let mut coordinates = Vec::with_capacity(stops.len());
        let mut waypoints = Vec::with_capacity(stops.len());
        for stop in &stops {
            let point = batch
                .get(stop.address())
                .map(|resolved| resolved.coordinates)
                .unwrap_or_else(|| Coordinates::new(0.0, 0.0));
            coordinates.push(point);
            waypoints.push(Waypoint {
                lat: point.lat,
                lng: point.lng,
                waypoint_type: stop.waypoint_type,
                rider_id: stop.passenger.rider_id,
                order: stop.passenger.order,
            });
        }

        let request = DirectionsRequest::from_stops(&coordinates)?;
        let result = tokio::time::timeout(self.timeout, self.directions.route(&request))
            .await
            .map_err(|_| RoutingError::Timeout(self.timeout))??;

        let distance_meters = result.total_distance_meters();
        let duration_seconds = result.total_duration_seconds();

        let ordered: Vec<&PassengerInRoute> = stops
            .iter()
            .filter(|stop| stop.waypoint_type == WaypointType::Pickup)
            .map(|stop| stop.passenger)
            .collect();
        let passenger_legs = attribute_legs(&ordered, &result.legs);

        let fallback_addresses = batch.fallback_addresses();
        if !fallback_addresses.is_empty() {
            log::warn!(
                "⚠️ Route computed with {} fallback-geocoded address(es): {:?}",
                fallback_addresses.len(),
                fallback_addresses
            );
        }

        Ok(PlannedRoute {
            route_details: RouteDetails {
                total_distance: format_distance(distance_meters),
                total_time: format_duration(duration_seconds),
                distance_meters,
                duration_seconds,
                waypoints,
            },
            legs: result.legs,
            passenger_legs,
            fallback_addresses,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::services::directions_service::DirectionsResult;
    use crate::services::geocoding_service::{GeocodingError, GeocodingProvider};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Geocoder determinista: "unknown*" falla, el resto se resuelve por longitud
    pub struct FakeGeocoder;

    #[async_trait]
    impl GeocodingProvider for FakeGeocoder {
        async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodingError> {
            if address.starts_with("unknown") {
                return Err(GeocodingError::AddressNotFound(address.to_string()));
            }
            Ok(Coordinates::new(address.len() as f64, 1.0))
        }
    }

    /// Directions falsas: cada tramo mide 1 km y 2 minutos
    #[derive(Default)]
    pub struct FakeDirections {
        pub fail: AtomicBool,
    }

    impl FakeDirections {
        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DirectionsProvider for FakeDirections {
        async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsResult, DirectionsError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DirectionsError::NoRoute("NoRoute".to_string()));
            }
            Ok(DirectionsResult {
                legs: (1..request.stop_count())
                    .map(|_| RouteLeg {
                        distance_meters: 1000.0,
                        duration_seconds: 120.0,
                    })
                    .collect(),
            })
        }
    }

    pub fn planner_with(directions: Arc<FakeDirections>) -> Arc<RoutePlanner> {
        let cache = Arc::new(GeocodeCache::new(
            Arc::new(FakeGeocoder),
            Coordinates::new(0.0, 0.0),
            Duration::from_secs(1),
        ));
        Arc::new(RoutePlanner::new(cache, directions, Duration::from_secs(1)))
    }

    pub fn passenger(name: &str, order: usize) -> PassengerInRoute {
        PassengerInRoute {
            rider_id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: String::new(),
            pickup_location: format!("{} home", name),
            drop_location: format!("{} office", name),
            order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_stop_sequence_is_pickups_then_drops() {
        let p2 = passenger("P2", 1);
        let p1 = passenger("P1", 0);
        let passengers = vec![p2.clone(), p1.clone()];

        let stops = build_stop_sequence(&passengers);
        let shape: Vec<(Uuid, WaypointType)> =
            stops.iter().map(|s| (s.passenger.rider_id, s.waypoint_type)).collect();
        assert_eq!(
            shape,
            vec![
                (p1.rider_id, WaypointType::Pickup),
                (p2.rider_id, WaypointType::Pickup),
                (p1.rider_id, WaypointType::Drop),
                (p2.rider_id, WaypointType::Drop),
            ]
        );
        assert_eq!(stops[0].address(), "P1 home");
        assert_eq!(stops[3].address(), "P2 office");
    }

    #[test]
    fn test_leg_attribution() {
        let a = passenger("A", 0);
        let b = passenger("B", 1);
        let legs: Vec<RouteLeg> = (1..=3)
            .map(|i| RouteLeg {
                distance_meters: i as f64,
                duration_seconds: i as f64,
            })
            .collect();

        let attributed = attribute_legs(&[&a, &b], &legs);
        assert_eq!(attributed[0].pickup_leg, None);
        assert_eq!(attributed[0].drop_leg, Some(legs[1]));
        assert_eq!(attributed[1].pickup_leg, Some(legs[0]));
        assert_eq!(attributed[1].drop_leg, Some(legs[2]));
    }

    #[tokio::test]
    async fn test_plan_produces_two_waypoints_per_passenger() {
        let planner = planner_with(Arc::new(FakeDirections::default()));
        let passengers = vec![passenger("A", 0), passenger("B", 1), passenger("C", 2)];

        let route = planner.plan(&passengers).await.unwrap();
        let waypoints = &route.route_details.waypoints;
        assert_eq!(waypoints.len(), 6);
        assert!(waypoints[..3].iter().all(|w| w.waypoint_type == WaypointType::Pickup));
        assert!(waypoints[3..].iter().all(|w| w.waypoint_type == WaypointType::Drop));
        assert_eq!(waypoints.iter().map(|w| w.order).collect::<Vec<_>>(), vec![0, 1, 2, 0, 1, 2]);

        assert_eq!(route.legs.len(), 5);
        assert_eq!(route.route_details.distance_meters, 5000.0);
        assert_eq!(route.route_details.total_distance, "5.0 km");
        assert_eq!(route.route_details.total_time, "10 mins");
        assert!(!route.uses_fallback());

        // determinista con la misma entrada
        let again = planner.plan(&passengers).await.unwrap();
        assert_eq!(again.route_details, route.route_details);
    }

    #[tokio::test]
    async fn test_plan_reports_fallback_addresses() {
        let planner = planner_with(Arc::new(FakeDirections::default()));
        let mut lost = passenger("Lost", 0);
        lost.pickup_location = "unknown street".to_string();

        let route = planner.plan(&[lost]).await.unwrap();
        assert_eq!(route.fallback_addresses, vec!["unknown street".to_string()]);
        assert_eq!(route.route_details.waypoints[0].lat, 0.0);
    }

    #[tokio::test]
    async fn test_plan_propagates_directions_failure() {
        let directions = Arc::new(FakeDirections::default());
        directions.set_failing(true);
        let planner = planner_with(directions);

        let err = planner.plan(&[passenger("A", 0)]).await.unwrap_err();
        assert!(matches!(err, RoutingError::Directions(DirectionsError::NoRoute(_))));
    }

    #[tokio::test]
    async fn test_plan_empty_list() {
        let planner = planner_with(Arc::new(FakeDirections::default()));
        let route = planner.plan(&[]).await.unwrap();
        assert!(route.route_details.waypoints.is_empty());
        assert_eq!(route.route_details.total_distance, "0.0 km");
    }
}
