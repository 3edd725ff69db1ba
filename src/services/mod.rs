//! Services module
//!
//! Lógica de routing: adaptadores de Mapbox (geocoding y directions), el
//! cache de geocodificación, el planificador de rutas y el builder de
//! route packets.

pub mod directions_service;
pub mod geocode_cache;
pub mod geocoding_service;
pub mod route_packet_builder;
pub mod route_planner;

pub use directions_service::{DirectionsProvider, MapboxDirectionsClient};
pub use geocode_cache::GeocodeCache;
pub use geocoding_service::{GeocodingProvider, MapboxGeocodingClient};
pub use route_packet_builder::{BuilderSnapshot, BuilderState, RoutePacketBuilder};
pub use route_planner::{PlannedRoute, RoutePlanner};
