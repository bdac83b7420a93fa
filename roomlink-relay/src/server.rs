use crate::config::RelayConfig;
use crate::error::Result;
use crate::mirror::{spawn_mirror_worker, HttpMirror};
use crate::relay::Relay;
use crate::route::create_relay_route;
use crate::sweeper::{spawn_heartbeat_watchdog, spawn_room_sweeper};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the relay until `shutdown` resolves
pub async fn run(config: RelayConfig, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let relay = match &config.directory_url {
        Some(url) => {
            info!(%url, "Mirroring rooms into directory");
            let (mirror, _worker) = spawn_mirror_worker(Arc::new(HttpMirror::new(url.clone())?));
            Relay::with_mirror(config.clone(), mirror)
        }
        None => Relay::new(config.clone()),
    };

    let watchdog = spawn_heartbeat_watchdog(relay.clone());
    let sweeper = spawn_room_sweeper(relay.clone());

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Relay listening on ws://{}/ws", config.bind_addr);

    let result = axum::serve(listener, create_relay_route(relay))
        .with_graceful_shutdown(shutdown)
        .await;

    watchdog.abort();
    sweeper.abort();
    info!("Relay stopped");
    Ok(result?)
}
