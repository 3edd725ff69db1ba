use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{NewRoutePacket, PacketRuleViolation, RoutePacket, VehicleTypeStats};
use crate::repositories::{InsertOutcome, RiderDirectory, RoutePacketRepository};
use crate::utils::errors::{capacity_error, not_found_error, validation_error, AppError, AppResult};

/// Store de route packets: valida reglas y expande pasajeros
#[derive(Clone)]
pub struct RoutePacketController {
    repository: Arc<dyn RoutePacketRepository>,
    riders: Arc<dyn RiderDirectory>,
}

impl From<PacketRuleViolation> for AppError {
    fn from(violation: PacketRuleViolation) -> Self {
        match violation {
            PacketRuleViolation::CapacityExceeded {
                vehicle_type,
                capacity,
                requested,
            } => capacity_error(vehicle_type.as_str(), capacity, requested),
            PacketRuleViolation::EmptyName => validation_error("name", &violation.to_string()),
            PacketRuleViolation::WaypointCount { .. } | PacketRuleViolation::WaypointShape { .. } => {
                validation_error("routeDetails", &violation.to_string())
            }
            _ => validation_error("passengers", &violation.to_string()),
        }
    }
}

impl RoutePacketController {
    pub fn new(repository: Arc<dyn RoutePacketRepository>, riders: Arc<dyn RiderDirectory>) -> Self {
        Self { repository, riders }
    }

    pub async fn create(&self, mut packet: NewRoutePacket, idempotency_key: Option<Uuid>) -> AppResult<InsertOutcome> {
        packet.check_rules()?;
        packet.sort_passengers();

        let packet = packet.into_packet(Uuid::new_v4(), Utc::now());
        let outcome = self.repository.insert(packet, idempotency_key).await?;

        if outcome.created {
            log::info!(
                "✅ Route packet '{}' created ({} passengers, {})",
                outcome.packet.name,
                outcome.packet.passengers.len(),
                outcome.packet.vehicle_type
            );
        } else {
            log::info!("🔁 Duplicate create for key {:?}, returning {}", idempotency_key, outcome.packet.id);
        }
        Ok(outcome)
    }

    pub async fn list(&self) -> AppResult<Vec<RoutePacket>> {
        let mut packets = self.repository.list().await?;
        self.expand_passengers(&mut packets).await?;
        Ok(packets)
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<RoutePacket> {
        let packet = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Route packet", &id.to_string()))?;

        let mut packets = vec![packet];
        self.expand_passengers(&mut packets).await?;
        packets
            .pop()
            .ok_or_else(|| AppError::Internal("expanded packet vanished".to_string()))
    }

    pub async fn update(&self, id: Uuid, mut packet: NewRoutePacket) -> AppResult<RoutePacket> {
        packet.check_rules()?;
        packet.sort_passengers();

        let updated = self
            .repository
            .replace(id, packet, Utc::now())
            .await?
            .ok_or_else(|| not_found_error("Route packet", &id.to_string()))?;

        log::info!("✏️ Route packet {} updated", id);
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if !self.repository.delete(id).await? {
            return Err(not_found_error("Route packet", &id.to_string()));
        }
        log::info!("🗑️ Route packet {} deleted", id);
        Ok(())
    }

    pub async fn statistics(&self) -> AppResult<Vec<VehicleTypeStats>> {
        self.repository.statistics().await
    }

    /// Reemplazar nombre/email/teléfono por los datos actuales del directorio.
    /// Si el rider ya no existe se deja la copia guardada.
    async fn expand_passengers(&self, packets: &mut [RoutePacket]) -> AppResult<()> {
        let mut ids: Vec<Uuid> = packets
            .iter()
            .flat_map(|p| p.passengers.iter().map(|passenger| passenger.rider_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let riders: HashMap<Uuid, _> = self
            .riders
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|rider| (rider.id, rider))
            .collect();

        for passenger in packets.iter_mut().flat_map(|p| p.passengers.iter_mut()) {
            if let Some(rider) = riders.get(&passenger.rider_id) {
                passenger.expand_with(rider);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PassengerInRoute, Rider, RouteDetails, VehicleType};
    use crate::repositories::{InMemoryRiderDirectory, InMemoryRoutePacketRepository};

    fn passenger(rider_id: Uuid, order: usize) -> PassengerInRoute {
        PassengerInRoute {
            rider_id,
            name: "Snapshot name".to_string(),
            email: "old@example.com".to_string(),
            phone: String::new(),
            pickup_location: "Home".to_string(),
            drop_location: "Office".to_string(),
            order,
        }
    }

    fn new_packet(vehicle_type: VehicleType, count: usize, distance: &str, time: &str, meters: f64, seconds: f64) -> NewRoutePacket {
        NewRoutePacket {
            name: "Shift".to_string(),
            vehicle_type,
            passengers: (0..count).map(|order| passenger(Uuid::new_v4(), order)).collect(),
            route_details: RouteDetails {
                total_distance: distance.to_string(),
                total_time: time.to_string(),
                distance_meters: meters,
                duration_seconds: seconds,
                waypoints: Vec::new(),
            },
        }
    }

    fn controller(riders: Vec<Rider>) -> RoutePacketController {
        RoutePacketController::new(
            Arc::new(InMemoryRoutePacketRepository::new()),
            Arc::new(InMemoryRiderDirectory::new(riders)),
        )
    }

    #[tokio::test]
    async fn test_create_over_capacity_persists_nothing() {
        let controller = controller(Vec::new());
        let err = controller
            .create(new_packet(VehicleType::FiveSeater, 7, "1 km", "1 mins", 1000.0, 60.0), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CapacityExceeded(_)));
        assert!(controller.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_and_delete_missing_is_not_found() {
        let controller = controller(Vec::new());
        let id = Uuid::new_v4();
        assert!(matches!(controller.get_by_id(id).await, Err(AppError::NotFound(_))));
        assert!(matches!(controller.delete(id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            controller
                .update(id, new_packet(VehicleType::FiveSeater, 1, "1 km", "1 mins", 1000.0, 60.0))
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_revalidates_capacity_and_touches_updated_at() {
        let controller = controller(Vec::new());
        let created = controller
            .create(new_packet(VehicleType::SevenSeater, 6, "1 km", "1 mins", 1000.0, 60.0), None)
            .await
            .unwrap()
            .packet;

        let shrink = NewRoutePacket {
            vehicle_type: VehicleType::FiveSeater,
            ..new_packet(VehicleType::FiveSeater, 6, "1 km", "1 mins", 1000.0, 60.0)
        };
        assert!(matches!(
            controller.update(created.id, shrink).await,
            Err(AppError::CapacityExceeded(_))
        ));

        let updated = controller
            .update(created.id, new_packet(VehicleType::FiveSeater, 2, "2 km", "4 mins", 2000.0, 240.0))
            .await
            .unwrap();
        assert_eq!(updated.vehicle_type, VehicleType::FiveSeater);
        assert_eq!(updated.passengers.len(), 2);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_passengers_expanded_from_directory() {
        let rider = Rider {
            id: Uuid::new_v4(),
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "+91 98450 00000".to_string(),
            pickup_location: "Home".to_string(),
            drop_location: "Office".to_string(),
        };
        let controller = controller(vec![rider.clone()]);

        let mut packet = new_packet(VehicleType::FiveSeater, 0, "1 km", "1 mins", 1000.0, 60.0);
        packet.passengers = vec![passenger(rider.id, 0), passenger(Uuid::new_v4(), 1)];
        let created = controller.create(packet, None).await.unwrap().packet;

        let fetched = controller.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched.passengers[0].name, "Asha Rao");
        assert_eq!(fetched.passengers[0].email, "asha@example.com");
        // rider desconocido: se mantiene la copia
        assert_eq!(fetched.passengers[1].name, "Snapshot name");
    }

    #[tokio::test]
    async fn test_statistics_scenario() {
        let controller = controller(Vec::new());
        controller
            .create(new_packet(VehicleType::FiveSeater, 3, "10.0 km", "20 mins", 10_000.0, 1_200.0), None)
            .await
            .unwrap();
        controller
            .create(new_packet(VehicleType::SevenSeater, 5, "15.0 km", "30 mins", 15_000.0, 1_800.0), None)
            .await
            .unwrap();

        let stats = controller.statistics().await.unwrap();
        assert_eq!(stats.len(), 2);

        let five = &stats[0];
        assert_eq!(five.vehicle_type, VehicleType::FiveSeater);
        assert_eq!((five.count, five.total_distance_km, five.total_time_minutes), (1, 10.0, 20.0));
        assert_eq!(five.average_passengers, 3.0);

        let seven = &stats[1];
        assert_eq!(seven.vehicle_type, VehicleType::SevenSeater);
        assert_eq!((seven.count, seven.total_distance_km, seven.total_time_minutes), (1, 15.0, 30.0));
        assert_eq!(seven.average_passengers, 5.0);
    }
}
