use std::sync::Arc;

use delivery_dispatch::api;
use delivery_dispatch::clients::http::HttpCollaborators;
use delivery_dispatch::clients::memory::InMemoryCollaborators;
use delivery_dispatch::clients::Collaborators;
use delivery_dispatch::config::Config;
use delivery_dispatch::engine::queue::run_dispatch_worker;
use delivery_dispatch::error::AppError;
use delivery_dispatch::state::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    init_tracing(&config);

    let collaborators = if config.in_memory_collaborators {
        tracing::warn!("running against in-memory collaborators");
        InMemoryCollaborators::new().collaborators()
    } else {
        let http = Arc::new(
            HttpCollaborators::new(config.collaborators.clone())
                .map_err(|err| AppError::Internal(err.to_string()))?,
        );
        Collaborators {
            orders: http.clone(),
            restaurants: http.clone(),
            identities: http.clone(),
            notifications: http,
        }
    };

    let (app_state, dispatch_rx) = AppState::new(
        collaborators,
        config.dispatch.clone(),
        config.dispatch_queue_size,
        config.event_buffer_size,
    );
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(run_dispatch_worker(shared_state.clone(), dispatch_rx));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        radius_km = config.dispatch.radius_km,
        proximity_alert_km = config.dispatch.proximity_alert_km,
        "delivery dispatch started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::new(config.log_level.clone());

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
