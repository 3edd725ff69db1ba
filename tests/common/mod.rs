//! Utilidades compartidas por los tests de integración

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use commute_routing::config::EnvironmentConfig;
use commute_routing::models::{Coordinates, Rider};
use commute_routing::repositories::{InMemoryRiderDirectory, InMemoryRoutePacketRepository};
use commute_routing::routes::create_app;
use commute_routing::services::directions_service::{
    DirectionsError, DirectionsProvider, DirectionsRequest, DirectionsResult, RouteLeg,
};
use commute_routing::services::geocoding_service::{GeocodingError, GeocodingProvider};
use commute_routing::services::{GeocodeCache, RoutePlanner};
use commute_routing::state::AppState;
use commute_routing::utils::jwt::{generate_token, JwtConfig};

/// "unknown*" no se resuelve; el resto usa la longitud como latitud
pub struct FakeGeocoder;

#[async_trait]
impl GeocodingProvider for FakeGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodingError> {
        if address.starts_with("unknown") {
            return Err(GeocodingError::AddressNotFound(address.to_string()));
        }
        Ok(Coordinates::new(address.len() as f64, 2.0))
    }
}

/// Cada tramo: 1 km, 2 minutos
#[derive(Default)]
pub struct FakeDirections {
    pub fail: AtomicBool,
}

#[async_trait]
impl DirectionsProvider for FakeDirections {
    async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsResult, DirectionsError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DirectionsError::NoRoute("NoRoute".to_string()));
        }
        Ok(DirectionsResult {
            legs: (1..request.stop_count())
                .map(|_| RouteLeg {
                    distance_meters: 1000.0,
                    duration_seconds: 120.0,
                })
                .collect(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub token: String,
    pub riders: Vec<Rider>,
    pub directions: Arc<FakeDirections>,
}

pub fn rider(name: &str) -> Rider {
    Rider {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: "+91 90000 00000".to_string(),
        pickup_location: format!("{} home", name),
        drop_location: "Tech Park office".to_string(),
    }
}

pub fn test_config() -> EnvironmentConfig {
    EnvironmentConfig::from_lookup(|name| match name {
        "JWT_SECRET" => Some("integration-secret".to_string()),
        "STORAGE_BACKEND" => Some("memory".to_string()),
        _ => None,
    })
    .expect("test config")
}

pub fn create_test_app() -> TestApp {
    let config = test_config();
    let token = generate_token("admin-1", &JwtConfig::from(&config)).expect("token");

    let riders: Vec<Rider> = ["Asha", "Bilal", "Chen", "Divya", "Emeka", "Farah", "Goran"]
        .iter()
        .map(|name| rider(name))
        .collect();

    let directions = Arc::new(FakeDirections::default());
    let cache = Arc::new(GeocodeCache::new(
        Arc::new(FakeGeocoder),
        Coordinates::new(0.0, 0.0),
        Duration::from_secs(1),
    ));
    let planner = Arc::new(RoutePlanner::new(cache, directions.clone(), Duration::from_secs(1)));

    let state = AppState::new(
        config,
        Arc::new(InMemoryRoutePacketRepository::new()),
        Arc::new(InMemoryRiderDirectory::new(riders.clone())),
        planner,
    );

    TestApp {
        router: create_app(state),
        token,
        riders,
        directions,
    }
}

impl TestApp {
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send_with(method, uri, body, &[]).await
    }

    pub async fn send_with(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", self.token));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        call(&self.router, request).await
    }

    pub fn set_directions_failing(&self, fail: bool) {
        self.directions.fail.store(fail, Ordering::SeqCst);
    }
}

pub async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
