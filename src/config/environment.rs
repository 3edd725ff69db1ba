//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::models::Coordinates;

/// Errores al leer la configuración
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Backend de persistencia de route packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub cors_origins: Vec<String>,
    pub mapbox_token: Option<String>,
    pub mapbox_base_url: String,
    pub external_timeout: Duration,
    pub geocode_fallback: Coordinates,
    pub geocode_country: Option<String>,
    pub storage_backend: StorageBackend,
    /// Inactividad tras la cual un borrador del builder se olvida
    pub draft_idle_timeout: Duration,
}

impl EnvironmentConfig {
    /// Leer la configuración de las variables de entorno del proceso
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Leer la configuración desde una función de búsqueda arbitraria
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend = match lookup("STORAGE_BACKEND").as_deref() {
            None | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            jwt_secret: lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            jwt_expiration: parse_or(&lookup, "JWT_EXPIRATION", 86_400)?,
            cors_origins: lookup("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            mapbox_token: lookup("MAPBOX_TOKEN").filter(|t| !t.trim().is_empty()),
            mapbox_base_url: lookup("MAPBOX_BASE_URL")
                .unwrap_or_else(|| "https://api.mapbox.com".to_string()),
            external_timeout: Duration::from_secs(parse_or(&lookup, "EXTERNAL_TIMEOUT_SECS", 10)?),
            geocode_fallback: Coordinates::new(
                parse_or(&lookup, "GEOCODE_FALLBACK_LAT", 0.0)?,
                parse_or(&lookup, "GEOCODE_FALLBACK_LNG", 0.0)?,
            ),
            geocode_country: lookup("GEOCODE_COUNTRY").filter(|c| !c.trim().is_empty()),
            storage_backend,
            draft_idle_timeout: Duration::from_secs(60 * parse_or::<_, u64>(&lookup, "DRAFT_IDLE_MINUTES", 120)?),
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::from_lookup(lookup_from(&[("JWT_SECRET", "s")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.external_timeout, Duration::from_secs(10));
        assert_eq!(config.storage_backend, StorageBackend::Postgres);
        assert!(config.mapbox_token.is_none());
        assert!(config.is_development());
        assert_eq!(config.server_url(), "0.0.0.0:3000");
        assert_eq!(config.draft_idle_timeout, Duration::from_secs(7_200));
    }

    #[test]
    fn test_missing_secret() {
        let err = EnvironmentConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn test_invalid_values() {
        let err = EnvironmentConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err = EnvironmentConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s"),
            ("STORAGE_BACKEND", "mongo"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORAGE_BACKEND", .. }));
    }

    #[test]
    fn test_overrides() {
        let config = EnvironmentConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s"),
            ("CORS_ORIGINS", "https://admin.example.com, ,https://ops.example.com"),
            ("GEOCODE_FALLBACK_LAT", "12.97"),
            ("GEOCODE_FALLBACK_LNG", "77.59"),
            ("STORAGE_BACKEND", "memory"),
            ("MAPBOX_TOKEN", "pk.test"),
            ("DRAFT_IDLE_MINUTES", "15"),
        ]))
        .unwrap();
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.geocode_fallback, Coordinates::new(12.97, 77.59));
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.mapbox_token.as_deref(), Some("pk.test"));
        assert_eq!(config.draft_idle_timeout, Duration::from_secs(900));
    }
}
