use std::sync::Arc;

use driver_missions::api;
use driver_missions::api::grpc::GrpcDriverService;
use driver_missions::api::grpc::pb::driver_service_server::DriverServiceServer;
use driver_missions::config;
use driver_missions::error;
use driver_missions::geo::geocoder::StaticGeocoder;
use driver_missions::state;
use driver_missions::storage::MemoryObjectStorage;
use tonic::transport::Server as TonicServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let geocoder = match &config.geocoder_table {
        Some(path) => StaticGeocoder::from_json_file(path, config.geocoder_max_distance_km)?,
        None => {
            tracing::warn!("GEOCODER_TABLE not set; zip lookups and geofenced drop-offs will fail");
            StaticGeocoder::new(Vec::new(), config.geocoder_max_distance_km)
        }
    };
    tracing::info!(zip_records = geocoder.len(), "geocoder loaded");

    let app_state = state::AppState::new(
        Arc::new(geocoder),
        Arc::new(MemoryObjectStorage::new(config.evidence_base_url.clone())),
        config.event_buffer_size,
    );
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    let grpc_addr: std::net::SocketAddr = format!("0.0.0.0:{}", config.grpc_port)
        .parse()
        .map_err(|err| error::AppError::Internal(format!("invalid grpc address: {err}")))?;
    let grpc_service = GrpcDriverService::new(shared_state.clone());

    tokio::spawn(async move {
        tracing::info!(grpc_port = %grpc_addr, "grpc server started");
        if let Err(err) = TonicServer::builder()
            .add_service(DriverServiceServer::new(grpc_service))
            .serve(grpc_addr)
            .await
        {
            tracing::error!(error = %err, "grpc server failed");
        }
    });

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
