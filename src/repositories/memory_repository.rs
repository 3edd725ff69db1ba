//! Repositorios en memoria
//!
//! Misma semántica que los repositorios PostgreSQL; se usan con
//! `STORAGE_BACKEND=memory` y en los tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{NewRoutePacket, Rider, RoutePacket, VehicleType, VehicleTypeStats};
use crate::repositories::rider_repository::RiderDirectory;
use crate::repositories::route_packet_repository::{InsertOutcome, RoutePacketRepository};
use crate::utils::errors::AppError;

#[derive(Default)]
struct PacketTable {
    // orden de inserción
    packets: Vec<RoutePacket>,
    idempotency_keys: HashMap<Uuid, Uuid>,
}

#[derive(Default)]
pub struct InMemoryRoutePacketRepository {
    table: RwLock<PacketTable>,
}

impl InMemoryRoutePacketRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoutePacketRepository for InMemoryRoutePacketRepository {
    async fn insert(&self, packet: RoutePacket, idempotency_key: Option<Uuid>) -> Result<InsertOutcome, AppError> {
        let mut table = self.table.write().await;

        if let Some(key) = idempotency_key {
            if let Some(existing_id) = table.idempotency_keys.get(&key) {
                let existing = table
                    .packets
                    .iter()
                    .find(|p| p.id == *existing_id)
                    .cloned()
                    .ok_or_else(|| AppError::Conflict(format!("idempotency key {} is in use", key)))?;
                return Ok(InsertOutcome {
                    packet: existing,
                    created: false,
                });
            }
            table.idempotency_keys.insert(key, packet.id);
        }

        table.packets.push(packet.clone());
        Ok(InsertOutcome {
            packet,
            created: true,
        })
    }

    async fn list(&self) -> Result<Vec<RoutePacket>, AppError> {
        let table = self.table.read().await;
        let mut packets: Vec<RoutePacket> = table.packets.iter().rev().cloned().collect();
        packets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(packets)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RoutePacket>, AppError> {
        let table = self.table.read().await;
        Ok(table.packets.iter().find(|p| p.id == id).cloned())
    }

    async fn replace(&self, id: Uuid, packet: NewRoutePacket, now: DateTime<Utc>) -> Result<Option<RoutePacket>, AppError> {
        let mut table = self.table.write().await;
        let Some(stored) = table.packets.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        stored.name = packet.name;
        stored.vehicle_type = packet.vehicle_type;
        stored.passengers = packet.passengers;
        stored.route_details = packet.route_details;
        stored.updated_at = now;
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut table = self.table.write().await;
        let before = table.packets.len();
        table.packets.retain(|p| p.id != id);
        table.idempotency_keys.retain(|_, packet_id| *packet_id != id);
        Ok(table.packets.len() < before)
    }

    async fn statistics(&self) -> Result<Vec<VehicleTypeStats>, AppError> {
        let table = self.table.read().await;
        let mut groups: BTreeMap<VehicleType, Vec<&RoutePacket>> = BTreeMap::new();
        for packet in &table.packets {
            groups.entry(packet.vehicle_type).or_default().push(packet);
        }

        Ok(groups
            .into_iter()
            .map(|(vehicle_type, packets)| {
                let count = packets.len();
                let meters: f64 = packets.iter().map(|p| p.route_details.distance_meters).sum();
                let seconds: f64 = packets.iter().map(|p| p.route_details.duration_seconds).sum();
                let passengers: usize = packets.iter().map(|p| p.passengers.len()).sum();
                VehicleTypeStats {
                    vehicle_type,
                    count: count as i64,
                    total_distance_km: meters / 1000.0,
                    total_time_minutes: seconds / 60.0,
                    average_passengers: passengers as f64 / count as f64,
                }
            })
            .collect())
    }
}

/// Directorio de riders fijo
#[derive(Default)]
pub struct InMemoryRiderDirectory {
    riders: RwLock<Vec<Rider>>,
}

impl InMemoryRiderDirectory {
    pub fn new(riders: Vec<Rider>) -> Self {
        Self {
            riders: RwLock::new(riders),
        }
    }

    pub async fn upsert(&self, rider: Rider) {
        let mut riders = self.riders.write().await;
        match riders.iter_mut().find(|r| r.id == rider.id) {
            Some(existing) => *existing = rider,
            None => riders.push(rider),
        }
    }
}

#[async_trait]
impl RiderDirectory for InMemoryRiderDirectory {
    async fn list(&self) -> Result<Vec<Rider>, AppError> {
        let mut riders = self.riders.read().await.clone();
        riders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(riders)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Rider>, AppError> {
        let riders = self.riders.read().await;
        Ok(riders.iter().filter(|r| ids.contains(&r.id)).cloned().collect())
    }
}
