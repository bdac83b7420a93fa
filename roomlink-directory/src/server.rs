use crate::config::DirectoryConfig;
use crate::directory::Directory;
use crate::error::Result;
use crate::route::create_directory_route;
use crate::sweeper::spawn_retention_sweeper;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Run the directory until `shutdown` resolves
pub async fn run(config: DirectoryConfig, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    if config.uses_dev_secret() {
        warn!("Using the built-in development JWT secret; set a real one in production");
    }

    let bind_addr = config.bind_addr;
    let directory = Directory::open(config)?;
    let sweeper = spawn_retention_sweeper(directory.clone());

    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "Directory listening on http://{}", bind_addr);

    let result = axum::serve(listener, create_directory_route(directory)).with_graceful_shutdown(shutdown).await;

    sweeper.abort();
    info!("Directory stopped");
    Ok(result?)
}
