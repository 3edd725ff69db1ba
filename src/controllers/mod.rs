//! Controllers
//!
//! Capa entre las rutas HTTP y los repositorios.

pub mod route_packet_controller;

pub use route_packet_controller::RoutePacketController;
