use std::{net::SocketAddr, sync::Arc};

use ambient_relay::{
    audio::{AmbientLibrary, prepare_assets},
    common::{AnyResult, logger},
    configs::Config,
    gateway::TungsteniteConnector,
    server::{AppState, shutdown_signal, spawn_monitor},
    transport,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(&config.logging);

    if let Err(e) = config.validate() {
        error!("{}", e);
        return Err(e.into());
    }

    let ambient = config.ambient.clone();
    let (prepared, library) = tokio::task::spawn_blocking(move || {
        let prepared = prepare_assets(&ambient);
        (prepared, AmbientLibrary::load(&ambient))
    })
    .await?;

    match prepared {
        Ok(0) => {}
        Ok(converted) => info!("Prepared {} ambient asset(s)", converted),
        Err(e) => warn!("Ambient asset preparation failed: {}", e),
    }

    let connector = Arc::new(TungsteniteConnector::new(&config.gateway));
    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(config, library, connector);
    let shutdown = CancellationToken::new();
    let monitor = spawn_monitor(state.clone(), shutdown.clone());

    let app = transport::http_server::router(state.clone());
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Ambient relay listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state, shutdown))
        .await?;

    let _ = monitor.await;
    Ok(())
}
