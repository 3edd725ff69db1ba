//! Route packets de transporte corporativo
//!
//! Builder de route packets, cache de geocodificación, adaptador de
//! Directions y store persistente expuestos bajo `/routing`.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
