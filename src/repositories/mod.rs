//! Repositorios
//!
//! Acceso a datos de route packets y del directorio de riders.

pub mod memory_repository;
pub mod rider_repository;
pub mod route_packet_repository;

pub use memory_repository::{InMemoryRiderDirectory, InMemoryRoutePacketRepository};
pub use rider_repository::{PgRiderDirectory, RiderDirectory};
pub use route_packet_repository::{InsertOutcome, PgRoutePacketRepository, RoutePacketRepository};
