//! Formato y parseo de distancias y tiempos
//!
//! Internamente todo va en metros y segundos; los textos tipo
//! `"10.0 km"` / `"20 mins"` solo existen para presentación.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DISTANCE_RE: Regex =
        Regex::new(r"(?i)^\s*([0-9]+(?:\.[0-9]+)?)\s*(km|mi|m)?\s*$").unwrap();
    static ref DURATION_PART_RE: Regex =
        Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(days?|hours?|hrs?|h|mins?|minutes?|secs?|seconds?|s)\b")
            .unwrap();
    static ref PLAIN_NUMBER_RE: Regex = Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*$").unwrap();
}

const METERS_PER_MILE: f64 = 1609.344;

/// `12345.0` -> `"12.3 km"`
pub fn format_distance(meters: f64) -> String {
    format!("{:.1} km", meters / 1000.0)
}

/// `1200.0` -> `"20 mins"`
pub fn format_duration(seconds: f64) -> String {
    format!("{} mins", (seconds / 60.0).round() as i64)
}

/// Parsear un texto de distancia a metros. Sin unidad se asume km.
pub fn parse_distance_meters(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    let caps = DISTANCE_RE.captures(&cleaned)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| "km".to_string());

    match unit.as_str() {
        "km" => Some(value * 1000.0),
        "mi" => Some(value * METERS_PER_MILE),
        "m" => Some(value),
        _ => None,
    }
}

/// Parsear un texto de duración a segundos (`"1 hour 5 mins"`, `"20 mins"`).
/// Un número sin unidad se interpreta como minutos.
pub fn parse_duration_seconds(text: &str) -> Option<f64> {
    if let Some(caps) = PLAIN_NUMBER_RE.captures(text) {
        let minutes: f64 = caps.get(1)?.as_str().parse().ok()?;
        return Some(minutes * 60.0);
    }

    let mut total = 0.0;
    let mut matched = false;
    for caps in DURATION_PART_RE.captures_iter(text) {
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str().to_lowercase();
        let factor = if unit.starts_with('d') {
            86_400.0
        } else if unit.starts_with('h') {
            3_600.0
        } else if unit.starts_with('m') {
            60.0
        } else {
            1.0
        };
        total += value * factor;
        matched = true;
    }

    matched.then_some(total)
}
