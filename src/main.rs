use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use dotenvy::dotenv;

use commute_routing::config::database::DatabaseConfig;
use commute_routing::config::{EnvironmentConfig, StorageBackend};
use commute_routing::database::DatabaseConnection;
use commute_routing::repositories::{
    InMemoryRiderDirectory, InMemoryRoutePacketRepository, PgRiderDirectory, PgRoutePacketRepository,
    RiderDirectory, RoutePacketRepository,
};
use commute_routing::routes::create_app;
use commute_routing::services::{GeocodeCache, MapboxDirectionsClient, MapboxGeocodingClient, RoutePlanner};
use commute_routing::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("🚐 Commute Routing API - Route Packets");
    info!("================================================");

    let config = EnvironmentConfig::from_env().context("invalid configuration")?;
    let token = config
        .mapbox_token
        .clone()
        .context("MAPBOX_TOKEN must be set")?;

    // Adaptadores de Mapbox
    let geocoder = MapboxGeocodingClient::new(
        &config.mapbox_base_url,
        token.clone(),
        config.geocode_country.clone(),
        config.external_timeout,
    )?;
    let directions = MapboxDirectionsClient::new(&config.mapbox_base_url, token, config.external_timeout)?;
    let cache = Arc::new(GeocodeCache::new(
        Arc::new(geocoder),
        config.geocode_fallback,
        config.external_timeout,
    ));
    let planner = Arc::new(RoutePlanner::new(cache, Arc::new(directions), config.external_timeout));

    // Persistencia
    let (repository, riders): (Arc<dyn RoutePacketRepository>, Arc<dyn RiderDirectory>) =
        match config.storage_backend {
            StorageBackend::Postgres => {
                let db_config = DatabaseConfig::from_env()?;
                let db_connection = match DatabaseConnection::new(&db_config).await {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("❌ Error conectando a la base de datos: {}", e);
                        return Err(anyhow::anyhow!("Error de base de datos: {}", e));
                    }
                };
                db_connection.run_migrations().await?;

                let pool = db_connection.pool().clone();
                (
                    Arc::new(PgRoutePacketRepository::new(pool.clone())),
                    Arc::new(PgRiderDirectory::new(pool)),
                )
            }
            StorageBackend::Memory => {
                info!("🧪 STORAGE_BACKEND=memory, los route packets no se persisten");
                (
                    Arc::new(InMemoryRoutePacketRepository::new()),
                    Arc::new(InMemoryRiderDirectory::new(Vec::new())),
                )
            }
        };

    let addr: SocketAddr = config.server_url().parse()?;
    let app = create_app(AppState::new(config, repository, riders, planner));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    info!("🚐 Route packets:");
    info!("   POST   /routing/route-packets - Crear route packet");
    info!("   GET    /routing/route-packets - Listar route packets");
    info!("   GET    /routing/route-packets/:id - Obtener route packet");
    info!("   PUT    /routing/route-packets/:id - Actualizar route packet");
    info!("   DELETE /routing/route-packets/:id - Eliminar route packet");
    info!("   GET    /routing/statistics - Estadísticas por tipo de vehículo");
    info!("🗺️ Routing:");
    info!("   POST   /routing/route-preview - Calcular ruta");
    info!("   POST   /routing/geocode - Geocodificar direcciones");
    info!("   GET    /routing/riders - Riders candidatos");
    info!("📝 Borradores:");
    info!("   POST   /routing/drafts - Abrir borrador");
    info!("   PUT    /routing/drafts/:id/vehicle - Elegir vehículo");
    info!("   POST   /routing/drafts/:id/passengers - Añadir pasajero");
    info!("   POST   /routing/drafts/:id/save - Guardar route packet");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ Error del servidor: {}", e);
            e
        })?;

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
