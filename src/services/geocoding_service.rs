//! Geocodificación de direcciones con Mapbox
//!
//! Convierte direcciones de texto libre en coordenadas usando la
//! Geocoding API v6 de Mapbox. El cache de proceso vive en
//! `geocode_cache`; este módulo solo hace la llamada HTTP.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::Coordinates;
use crate::utils::validation::validate_coordinates;

/// Errores de geocodificación
#[derive(Debug, Error)]
pub enum GeocodingError {
    #[error("Geocoding request failed: {0}")]
    RequestFailed(String),

    #[error("Geocoding provider returned status {0}")]
    ProviderStatus(u16),

    #[error("Geocoding parse error: {0}")]
    ParseError(String),

    #[error("Address not found: {0}")]
    AddressNotFound(String),
}

/// Proveedor de geocodificación (dirección -> coordenadas)
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodingError>;
}

#[derive(Debug, Deserialize)]
struct MapboxGeocodingResponse {
    features: Vec<MapboxFeature>,
}

#[derive(Debug, Deserialize)]
struct MapboxFeature {
    geometry: MapboxGeometry,
}

#[derive(Debug, Deserialize)]
struct MapboxGeometry {
    coordinates: Vec<f64>, // [longitude, latitude]
}

/// Cliente de la Geocoding API de Mapbox
pub struct MapboxGeocodingClient {
    base_url: String,
    mapbox_token: String,
    country: Option<String>,
    client: Client,
}

impl MapboxGeocodingClient {
    pub fn new(
        base_url: &str,
        mapbox_token: String,
        country: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GeocodingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeocodingError::RequestFailed(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            mapbox_token,
            country,
            client,
        })
    }

    fn build_url(&self, address: &str) -> String {
        let mut url = format!(
            "{}/search/geocode/v6/forward?q={}&access_token={}&limit=1",
            self.base_url,
            urlencoding::encode(address),
            self.mapbox_token
        );
        if let Some(country) = &self.country {
            url.push_str("&country=");
            url.push_str(&urlencoding::encode(country));
        }
        url
    }
}

#[async_trait]
impl GeocodingProvider for MapboxGeocodingClient {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodingError> {
        log::debug!("🗺️ Geocoding address: {}", address);

        let response = self
            .client
            .get(self.build_url(address))
            .header("User-Agent", "CommuteRouting/1.0")
            .send()
            .await
            .map_err(|e| GeocodingError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodingError::ProviderStatus(status.as_u16()));
        }

        let body: MapboxGeocodingResponse = response
            .json()
            .await
            .map_err(|e| GeocodingError::ParseError(e.to_string()))?;

        let feature = body
            .features
            .first()
            .ok_or_else(|| GeocodingError::AddressNotFound(address.to_string()))?;

        match feature.geometry.coordinates.as_slice() {
            [lng, lat, ..] => {
                validate_coordinates(*lat, *lng)
                    .map_err(|e| GeocodingError::ParseError(e.to_string()))?;
                log::debug!("✅ Geocoding successful: {} -> ({}, {})", address, lat, lng);
                Ok(Coordinates::new(*lat, *lng))
            }
            _ => Err(GeocodingError::ParseError(format!(
                "feature for '{}' has no coordinates",
                address
            ))),
        }
    }
}
