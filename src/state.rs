//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::environment::EnvironmentConfig;
use crate::controllers::RoutePacketController;
use crate::repositories::{RiderDirectory, RoutePacketRepository};
use crate::services::{RoutePacketBuilder, RoutePlanner};
use crate::utils::errors::{not_found_error, AppResult};
use crate::utils::jwt::JwtConfig;

/// Builder compartido por las requests de un mismo borrador
pub type SharedBuilder = Arc<Mutex<RoutePacketBuilder>>;

struct DraftEntry {
    builder: SharedBuilder,
    touched: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EnvironmentConfig>,
    pub jwt: JwtConfig,
    pub packets: RoutePacketController,
    pub riders: Arc<dyn RiderDirectory>,
    pub planner: Arc<RoutePlanner>,
    drafts: Arc<RwLock<HashMap<Uuid, DraftEntry>>>,
}

impl AppState {
    pub fn new(
        config: EnvironmentConfig,
        repository: Arc<dyn RoutePacketRepository>,
        riders: Arc<dyn RiderDirectory>,
        planner: Arc<RoutePlanner>,
    ) -> Self {
        Self {
            jwt: JwtConfig::from(&config),
            config: Arc::new(config),
            packets: RoutePacketController::new(repository, riders.clone()),
            riders,
            planner,
            drafts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registrar un borrador nuevo, olvidando antes los inactivos
    pub async fn open_draft(&self, builder: RoutePacketBuilder) -> (Uuid, SharedBuilder) {
        let id = Uuid::new_v4();
        let shared = Arc::new(Mutex::new(builder));

        let mut drafts = self.drafts.write().await;
        self.evict_idle(&mut drafts);
        drafts.insert(
            id,
            DraftEntry {
                builder: shared.clone(),
                touched: Instant::now(),
            },
        );
        log::info!("📝 Draft {} opened", id);
        (id, shared)
    }

    pub async fn draft(&self, id: Uuid) -> AppResult<SharedBuilder> {
        let mut drafts = self.drafts.write().await;
        let entry = drafts
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Draft", &id.to_string()))?;
        entry.touched = Instant::now();
        Ok(entry.builder.clone())
    }

    /// Olvidar un borrador tras cancelarlo o guardarlo
    pub async fn discard_draft(&self, id: Uuid) {
        if self.drafts.write().await.remove(&id).is_some() {
            log::info!("🧹 Draft {} discarded", id);
        }
    }

    pub async fn draft_count(&self) -> usize {
        self.drafts.read().await.len()
    }

    /// Un borrador que alguna request todavía sostiene no se expulsa
    fn evict_idle(&self, drafts: &mut HashMap<Uuid, DraftEntry>) {
        let idle_timeout = self.config.draft_idle_timeout;
        let before = drafts.len();
        drafts.retain(|_, entry| {
            entry.touched.elapsed() < idle_timeout || Arc::strong_count(&entry.builder) > 1
        });

        let evicted = before - drafts.len();
        if evicted > 0 {
            log::info!("🧹 Evicted {} idle draft(s)", evicted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryRiderDirectory, InMemoryRoutePacketRepository};
    use crate::services::route_planner::test_support::{planner_with, FakeDirections};
    use std::time::Duration;

    fn state(draft_idle_timeout: Duration) -> AppState {
        let mut config = EnvironmentConfig::from_lookup(|name| match name {
            "JWT_SECRET" => Some("state-secret".to_string()),
            _ => None,
        })
        .unwrap();
        config.draft_idle_timeout = draft_idle_timeout;

        AppState::new(
            config,
            Arc::new(InMemoryRoutePacketRepository::new()),
            Arc::new(InMemoryRiderDirectory::new(Vec::new())),
            planner_with(Arc::new(FakeDirections::default())),
        )
    }

    fn builder(state: &AppState) -> RoutePacketBuilder {
        RoutePacketBuilder::new(state.planner.clone())
    }

    #[tokio::test]
    async fn test_idle_drafts_evicted_on_open() {
        let state = state(Duration::ZERO);

        let (stale, handle) = state.open_draft(builder(&state)).await;
        drop(handle);
        let (fresh, _handle) = state.open_draft(builder(&state)).await;

        assert!(state.draft(stale).await.is_err());
        assert!(state.draft(fresh).await.is_ok());
        assert_eq!(state.draft_count().await, 1);
    }

    #[tokio::test]
    async fn test_held_draft_survives_eviction() {
        let state = state(Duration::ZERO);

        let (held, _handle) = state.open_draft(builder(&state)).await;
        state.open_draft(builder(&state)).await;

        assert!(state.draft(held).await.is_ok());
    }

    #[tokio::test]
    async fn test_active_drafts_kept() {
        let state = state(Duration::from_secs(3_600));

        let (first, handle) = state.open_draft(builder(&state)).await;
        drop(handle);
        state.open_draft(builder(&state)).await;

        assert!(state.draft(first).await.is_ok());
        assert_eq!(state.draft_count().await, 2);
        state.discard_draft(first).await;
        assert_eq!(state.draft_count().await, 1);
    }
}
