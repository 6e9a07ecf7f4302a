pub mod handlers;

use crate::AppContext;
use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

pub async fn start_server(ctx: Arc<AppContext>, addr: SocketAddr) -> Result<()> {
    let app = Router::new().nest("/api", handlers::router(ctx));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
