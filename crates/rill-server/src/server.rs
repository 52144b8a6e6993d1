use std::sync::Arc;

use rill_events::{DiagnosticSink, Dispatcher, TracingSink};
use rill_pipeline::Pipeline;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Rill ingress server.
pub struct RillServer {
    config: ServerConfig,
}

impl RillServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Wire the pipeline on the current runtime, with diagnostics going
    /// through `tracing`.
    pub fn pipeline(&self) -> ServerResult<Pipeline> {
        let sink: Arc<dyn DiagnosticSink> = Arc::new(TracingSink);
        let dispatcher = Dispatcher::new(self.config.pipeline.dispatch(), sink)?;
        Ok(Pipeline::build(&self.config.pipeline, dispatcher)?)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let pipeline = self.pipeline()?;
        let app = build_router(pipeline.clone());
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("Rill server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        tracing::info!(in_flight = pipeline.dispatcher().in_flight(), "draining notifications");
        pipeline.settle().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
