//! Modelos del sistema
//!
//! Este módulo contiene los modelos de dominio del subsistema de routing:
//! route packets, riders y coordenadas.

pub mod geo;
pub mod rider;
pub mod route_packet;

pub use geo::Coordinates;
pub use rider::Rider;
pub use route_packet::*;
