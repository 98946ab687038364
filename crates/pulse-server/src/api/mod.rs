//! HTTP API: submission, status, progress events and reports

pub mod error;
pub mod events;
pub mod handlers;
pub mod router;

pub use error::ApiError;
pub use router::router;

use crate::service::AnalysisService;
use std::future::Future;
use tokio::net::TcpListener;

/// Bind the configured address and serve until `shutdown` resolves
pub async fn serve<F>(service: AnalysisService, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(service.config().bind_addr.as_str()).await?;
    tracing::info!(addr = %listener.local_addr()?, "Market pulse API listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Market pulse API stopped");
    Ok(())
}
