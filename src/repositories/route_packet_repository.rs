use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewRoutePacket, PassengerInRoute, RouteDetails, RoutePacket, VehicleTypeStats};
use crate::utils::errors::AppError;

/// Resultado de una inserción con clave de idempotencia
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    pub packet: RoutePacket,
    /// `false` si la clave ya existía y se devolvió el packet previo
    pub created: bool,
}

/// Persistencia de route packets
#[async_trait]
pub trait RoutePacketRepository: Send + Sync {
    async fn insert(&self, packet: RoutePacket, idempotency_key: Option<Uuid>) -> Result<InsertOutcome, AppError>;

    /// Todos los packets, el más reciente primero
    async fn list(&self) -> Result<Vec<RoutePacket>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RoutePacket>, AppError>;

    /// Reemplazo completo; `None` si el id no existe
    async fn replace(&self, id: Uuid, packet: NewRoutePacket, now: DateTime<Utc>) -> Result<Option<RoutePacket>, AppError>;

    /// `true` si se borró, `false` si no existía
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// Una fila por tipo de vehículo
    async fn statistics(&self) -> Result<Vec<VehicleTypeStats>, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct RoutePacketRow {
    id: Uuid,
    name: String,
    vehicle_type: String,
    passengers: Json<Vec<PassengerInRoute>>,
    route_details: Json<RouteDetails>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RoutePacketRow> for RoutePacket {
    type Error = AppError;

    fn try_from(row: RoutePacketRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            vehicle_type: row.vehicle_type.parse().map_err(AppError::Internal)?,
            passengers: row.passengers.0,
            route_details: row.route_details.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    vehicle_type: String,
    count: i64,
    total_distance_km: f64,
    total_time_minutes: f64,
    average_passengers: f64,
}

const SELECT_COLUMNS: &str =
    "id, name, vehicle_type, passengers, route_details, created_at, updated_at";

pub struct PgRoutePacketRepository {
    pool: PgPool,
}

impl PgRoutePacketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_idempotency_key(&self, key: Uuid) -> Result<Option<RoutePacket>, AppError> {
        let row = sqlx::query_as::<_, RoutePacketRow>(&format!(
            "SELECT {} FROM route_packets WHERE idempotency_key = $1",
            SELECT_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RoutePacket::try_from).transpose()
    }
}

#[async_trait]
impl RoutePacketRepository for PgRoutePacketRepository {
    async fn insert(&self, packet: RoutePacket, idempotency_key: Option<Uuid>) -> Result<InsertOutcome, AppError> {
        let row = sqlx::query_as::<_, RoutePacketRow>(&format!(
            r#"
            INSERT INTO route_packets
                (id, name, vehicle_type, passengers, route_details,
                 total_distance_meters, total_duration_seconds, idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(packet.id)
        .bind(&packet.name)
        .bind(packet.vehicle_type.as_str())
        .bind(Json(&packet.passengers))
        .bind(Json(&packet.route_details))
        .bind(packet.route_details.distance_meters)
        .bind(packet.route_details.duration_seconds)
        .bind(idempotency_key)
        .bind(packet.created_at)
        .bind(packet.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(InsertOutcome {
                packet: row.try_into()?,
                created: true,
            });
        }

        // Solo hay conflicto si venía clave de idempotencia
        let key = idempotency_key
            .ok_or_else(|| AppError::Internal("insert returned no row".to_string()))?;
        let existing = self
            .find_by_idempotency_key(key)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("idempotency key {} is in use", key)))?;

        Ok(InsertOutcome {
            packet: existing,
            created: false,
        })
    }

    async fn list(&self) -> Result<Vec<RoutePacket>, AppError> {
        let rows = sqlx::query_as::<_, RoutePacketRow>(&format!(
            "SELECT {} FROM route_packets ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RoutePacket::try_from).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RoutePacket>, AppError> {
        let row = sqlx::query_as::<_, RoutePacketRow>(&format!(
            "SELECT {} FROM route_packets WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RoutePacket::try_from).transpose()
    }

    async fn replace(&self, id: Uuid, packet: NewRoutePacket, now: DateTime<Utc>) -> Result<Option<RoutePacket>, AppError> {
        let row = sqlx::query_as::<_, RoutePacketRow>(&format!(
            r#"
            UPDATE route_packets
            SET name = $2, vehicle_type = $3, passengers = $4, route_details = $5,
                total_distance_meters = $6, total_duration_seconds = $7, updated_at = $8
            WHERE id = $1
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(&packet.name)
        .bind(packet.vehicle_type.as_str())
        .bind(Json(&packet.passengers))
        .bind(Json(&packet.route_details))
        .bind(packet.route_details.distance_meters)
        .bind(packet.route_details.duration_seconds)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RoutePacket::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM route_packets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn statistics(&self) -> Result<Vec<VehicleTypeStats>, AppError> {
        let rows = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                vehicle_type,
                COUNT(*) AS count,
                (COALESCE(SUM(total_distance_meters), 0) / 1000.0)::DOUBLE PRECISION AS total_distance_km,
                (COALESCE(SUM(total_duration_seconds), 0) / 60.0)::DOUBLE PRECISION AS total_time_minutes,
                AVG(jsonb_array_length(passengers))::DOUBLE PRECISION AS average_passengers
            FROM route_packets
            GROUP BY vehicle_type
            ORDER BY vehicle_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(VehicleTypeStats {
                    vehicle_type: row.vehicle_type.parse().map_err(AppError::Internal)?,
                    count: row.count,
                    total_distance_km: row.total_distance_km,
                    total_time_minutes: row.total_time_minutes,
                    average_passengers: row.average_passengers,
                })
            })
            .collect()
    }
}
