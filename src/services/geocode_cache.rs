//! Cache de geocodificación en memoria
//!
//! Resuelve cada dirección distinta una sola vez durante la vida del
//! proceso. Las búsquedas que faltan se lanzan en paralelo, en oleadas de
//! `LOOKUP_WAVE`; si una falla
//! (o supera el timeout) se devuelve la coordenada de respaldo marcada
//! como `fallback`, de modo que el lote nunca falla. Los respaldos no se
//! guardan en cache: la siguiente petición vuelve a intentarlo.

use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};

use crate::models::Coordinates;
use crate::services::geocoding_service::GeocodingProvider;

/// Dirección resuelta
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedAddress {
    pub coordinates: Coordinates,
    /// `true` si no se pudo geocodificar y se usó la coordenada por defecto
    pub fallback: bool,
}

/// Resultado de un lote: una entrada por cada dirección pedida
#[derive(Debug, Clone, Default)]
pub struct GeocodeBatch {
    entries: HashMap<String, ResolvedAddress>,
}

impl GeocodeBatch {
    pub fn get(&self, address: &str) -> Option<&ResolvedAddress> {
        self.entries.get(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direcciones que cayeron en la coordenada de respaldo, ordenadas
    pub fn fallback_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, resolved)| resolved.fallback)
            .map(|(address, _)| address.clone())
            .collect();
        addresses.sort();
        addresses
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedAddress)> {
        self.entries.iter()
    }
}

/// Búsquedas simultáneas por oleada
const LOOKUP_WAVE: usize = 10;

type CacheSlot = Arc<OnceCell<Coordinates>>;

pub struct GeocodeCache {
    provider: Arc<dyn GeocodingProvider>,
    entries: RwLock<HashMap<String, CacheSlot>>,
    fallback: Coordinates,
    timeout: Duration,
}

impl GeocodeCache {
    pub fn new(provider: Arc<dyn GeocodingProvider>, fallback: Coordinates, timeout: Duration) -> Self {
        Self {
            provider,
            entries: RwLock::new(HashMap::new()),
            fallback,
            timeout,
        }
    }

    /// Número de direcciones ya resueltas en cache
    pub async fn cached_count(&self) -> usize {
        self.entries
            .read()
            .await
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Resolver un conjunto de direcciones. Nunca falla.
    ///
    /// Cada dirección tiene un slot compartido: si otro lote ya la está
    /// buscando, se espera a su resultado en lugar de repetir la consulta.
    pub async fn resolve_all<I, S>(&self, addresses: I) -> GeocodeBatch
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = addresses
            .into_iter()
            .map(|address| address.as_ref().to_string())
            .collect();

        let slots: Vec<(String, CacheSlot)> = {
            let mut entries = self.entries.write().await;
            unique
                .into_iter()
                .map(|address| {
                    let slot = entries.entry(address.clone()).or_default().clone();
                    (address, slot)
                })
                .collect()
        };

        let mut batch = GeocodeBatch::default();
        let mut missing = Vec::new();
        for (address, slot) in slots {
            match slot.get() {
                Some(coordinates) => {
                    batch.entries.insert(
                        address,
                        ResolvedAddress {
                            coordinates: *coordinates,
                            fallback: false,
                        },
                    );
                }
                None => missing.push((address, slot)),
            }
        }

        if missing.is_empty() {
            return batch;
        }

        log::info!("🗺️ Geocoding {} uncached addresses", missing.len());

        for wave in missing.chunks(LOOKUP_WAVE) {
            let lookups = wave
                .iter()
                .map(|(address, slot)| async move { (address, self.lookup(address, slot).await) });

            for (address, entry) in join_all(lookups).await {
                batch.entries.insert(address.clone(), entry);
            }
        }

        batch
    }

    /// Buscar una dirección a través de su slot. Un fallo deja el slot vacío
    /// para que la siguiente petición vuelva a intentarlo.
    async fn lookup(&self, address: &str, slot: &OnceCell<Coordinates>) -> ResolvedAddress {
        let outcome = slot
            .get_or_try_init(|| async {
                match tokio::time::timeout(self.timeout, self.provider.geocode(address)).await {
                    Ok(Ok(coordinates)) => Ok(coordinates),
                    Ok(Err(e)) => {
                        log::warn!("⚠️ Geocoding failed for '{}', using fallback: {}", address, e);
                        Err(())
                    }
                    Err(_) => {
                        log::warn!(
                            "⚠️ Geocoding timed out after {:?} for '{}', using fallback",
                            self.timeout,
                            address
                        );
                        Err(())
                    }
                }
            })
            .await;

        match outcome {
            Ok(coordinates) => ResolvedAddress {
                coordinates: *coordinates,
                fallback: false,
            },
            Err(()) => self.fallback_entry(),
        }
    }

    fn fallback_entry(&self) -> ResolvedAddress {
        ResolvedAddress {
            coordinates: self.fallback,
            fallback: true,
        }
    }
}
