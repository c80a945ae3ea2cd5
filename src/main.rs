use std::{net::SocketAddr, sync::Arc, time::Duration};

use tracing::{error, info};
use voxmix::{
    audio::SymphoniaFactory,
    common::{logger, types::AnyResult},
    configs::Config,
    player::{LogNotifier, PlayerServices},
    server::{AppState, SessionRegistry},
    sources::DirectResolver,
    transport,
    voice::LocalConnector,
};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(config.logging.as_ref());

    info!("Starting voxmix v{}", env!("CARGO_PKG_VERSION"));

    let http = reqwest::Client::builder()
        .user_agent(concat!("voxmix/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let services = PlayerServices {
        resolver: Arc::new(DirectResolver::new(http.clone())),
        producers: Arc::new(SymphoniaFactory::new(http)),
        connector: Arc::new(LocalConnector::new(config.voice.clone())),
        notifier: Arc::new(LogNotifier),
    };

    let registry = Arc::new(SessionRegistry::new(config.player.clone(), services));
    let sweeper = registry.spawn_sweeper();

    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let shared_state = Arc::new(AppState {
        config,
        registry: registry.clone(),
    });

    let app = transport::http_server::router(shared_state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("voxmix listening on {}", address);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("HTTP server error: {}", e);
    }

    sweeper.abort();
    registry.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
