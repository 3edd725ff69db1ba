//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! JWT y formato de unidades.

pub mod errors;
pub mod jwt;
pub mod units;
pub mod validation;
