use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Rider;
use crate::utils::errors::AppError;

/// Directorio de riders (solo lectura desde routing)
#[async_trait]
pub trait RiderDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<Rider>, AppError>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Rider>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Rider>, AppError> {
        Ok(self.find_by_ids(&[id]).await?.into_iter().next())
    }
}

pub struct PgRiderDirectory {
    pool: PgPool,
}

impl PgRiderDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RiderDirectory for PgRiderDirectory {
    async fn list(&self) -> Result<Vec<Rider>, AppError> {
        let riders = sqlx::query_as::<_, Rider>(
            "SELECT id, name, email, phone, pickup_location, drop_location FROM riders ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(riders)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Rider>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let riders = sqlx::query_as::<_, Rider>(
            "SELECT id, name, email, phone, pickup_location, drop_location FROM riders WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(riders)
    }
}
