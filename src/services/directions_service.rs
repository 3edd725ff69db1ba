//! Directions API de Mapbox
//!
//! Calcula la ruta en coche a través de una lista ordenada de paradas.
//! La Directions API respeta el orden de entrada (no reordena waypoints),
//! que es justo lo que necesita el constructor de route packets.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::Coordinates;

/// Errores del proveedor de direcciones
#[derive(Debug, Error)]
pub enum DirectionsError {
    #[error("a route needs at least two stops, got {0}")]
    NotEnoughStops(usize),

    #[error("Directions request failed: {0}")]
    RequestFailed(String),

    #[error("Directions provider returned status {0}")]
    NoRoute(String),

    #[error("Directions parse error: {0}")]
    ParseError(String),
}

/// Modo de viaje. Solo se usa conducción.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelMode {
    Driving,
}

impl TravelMode {
    fn profile(&self) -> &'static str {
        match self {
            TravelMode::Driving => "mapbox/driving",
        }
    }
}

/// Petición de ruta: origen, paradas intermedias y destino, en orden fijo
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRequest {
    pub origin: Coordinates,
    pub destination: Coordinates,
    pub intermediate_stops: Vec<Coordinates>,
    pub mode: TravelMode,
    pub optimize_waypoints: bool,
}

impl DirectionsRequest {
    /// Construir desde la secuencia completa de paradas
    pub fn from_stops(stops: &[Coordinates]) -> Result<Self, DirectionsError> {
        match stops {
            [origin, middle @ .., destination] => Ok(Self {
                origin: *origin,
                destination: *destination,
                intermediate_stops: middle.to_vec(),
                mode: TravelMode::Driving,
                optimize_waypoints: false,
            }),
            _ => Err(DirectionsError::NotEnoughStops(stops.len())),
        }
    }

    pub fn stop_count(&self) -> usize {
        self.intermediate_stops.len() + 2
    }

    pub fn stops(&self) -> impl Iterator<Item = &Coordinates> {
        std::iter::once(&self.origin)
            .chain(self.intermediate_stops.iter())
            .chain(std::iter::once(&self.destination))
    }
}

/// Tramo entre dos paradas consecutivas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Ruta calculada
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsResult {
    pub legs: Vec<RouteLeg>,
}

impl DirectionsResult {
    pub fn total_distance_meters(&self) -> f64 {
        self.legs.iter().map(|leg| leg.distance_meters).sum()
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.legs.iter().map(|leg| leg.duration_seconds).sum()
    }
}

/// Proveedor de rutas
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsResult, DirectionsError>;
}

#[derive(Debug, Deserialize)]
struct MapboxDirectionsResponse {
    code: String,
    #[serde(default)]
    routes: Vec<MapboxDirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct MapboxDirectionsRoute {
    legs: Vec<MapboxDirectionsLeg>,
}

#[derive(Debug, Deserialize)]
struct MapboxDirectionsLeg {
    distance: f64,
    duration: f64,
}

/// Cliente de la Directions API v5 de Mapbox
pub struct MapboxDirectionsClient {
    base_url: String,
    mapbox_token: String,
    client: Client,
}

impl MapboxDirectionsClient {
    pub fn new(base_url: &str, mapbox_token: String, timeout: Duration) -> Result<Self, DirectionsError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectionsError::RequestFailed(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            mapbox_token,
            client,
        })
    }

    fn build_url(&self, request: &DirectionsRequest) -> String {
        let coordinates = request
            .stops()
            .map(Coordinates::to_lng_lat)
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/directions/v5/{}/{}?access_token={}&overview=false&steps=false",
            self.base_url,
            request.mode.profile(),
            coordinates,
            self.mapbox_token
        )
    }
}

#[async_trait]
impl DirectionsProvider for MapboxDirectionsClient {
    async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsResult, DirectionsError> {
        log::debug!("🧭 Requesting directions for {} stops", request.stop_count());

        let response = self
            .client
            .get(self.build_url(request))
            .header("User-Agent", "CommuteRouting/1.0")
            .send()
            .await
            .map_err(|e| DirectionsError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| DirectionsError::RequestFailed(e.to_string()))?;

        // Mapbox devuelve el código ("NoRoute", "InvalidInput"...) también en errores 4xx
        let body: MapboxDirectionsResponse = match serde_json::from_str(&response_text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(DirectionsError::NoRoute(status.as_u16().to_string()))
            }
            Err(e) => return Err(DirectionsError::ParseError(e.to_string())),
        };

        if body.code != "Ok" {
            return Err(DirectionsError::NoRoute(body.code));
        }

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| DirectionsError::NoRoute("NoRoute".to_string()))?;

        let expected_legs = request.stop_count() - 1;
        if route.legs.len() != expected_legs {
            return Err(DirectionsError::ParseError(format!(
                "expected {} legs, got {}",
                expected_legs,
                route.legs.len()
            )));
        }

        Ok(DirectionsResult {
            legs: route
                .legs
                .into_iter()
                .map(|leg| RouteLeg {
                    distance_meters: leg.distance,
                    duration_seconds: leg.duration,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng)
    }

    #[test]
    fn test_request_from_stops_keeps_order() {
        let stops = vec![point(1.0, 1.0), point(2.0, 2.0), point(3.0, 3.0), point(4.0, 4.0)];
        let request = DirectionsRequest::from_stops(&stops).unwrap();

        assert_eq!(request.origin, stops[0]);
        assert_eq!(request.destination, stops[3]);
        assert_eq!(request.intermediate_stops, vec![stops[1], stops[2]]);
        assert!(!request.optimize_waypoints);
        assert_eq!(request.mode, TravelMode::Driving);
        assert_eq!(request.stops().copied().collect::<Vec<_>>(), stops);
    }

    #[test]
    fn test_request_needs_two_stops() {
        assert!(matches!(
            DirectionsRequest::from_stops(&[point(1.0, 1.0)]),
            Err(DirectionsError::NotEnoughStops(1))
        ));
    }

    #[test]
    fn test_totals_sum_legs() {
        let result = DirectionsResult {
            legs: vec![
                RouteLeg { distance_meters: 1500.0, duration_seconds: 300.0 },
                RouteLeg { distance_meters: 2500.0, duration_seconds: 420.0 },
            ],
        };
        assert_eq!(result.total_distance_meters(), 4000.0);
        assert_eq!(result.total_duration_seconds(), 720.0);
    }

    #[test]
    fn test_build_url_uses_lng_lat() {
        let client =
            MapboxDirectionsClient::new("https://api.mapbox.com", "pk.test".into(), Duration::from_secs(5))
                .unwrap();
        let request = DirectionsRequest::from_stops(&[point(12.5, 77.5), point(13.0, 78.0)]).unwrap();
        assert_eq!(
            client.build_url(&request),
            "https://api.mapbox.com/directions/v5/mapbox/driving/77.5,12.5;78,13?access_token=pk.test&overview=false&steps=false"
        );
    }
}
