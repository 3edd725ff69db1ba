//! DTOs (Data Transfer Objects)
//!
//! Requests y responses de la API de routing.

pub mod draft_dto;
pub mod route_packet_dto;
