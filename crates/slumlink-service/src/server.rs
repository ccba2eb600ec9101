//! Server setup and lifecycle

use crate::config::ServiceConfig;
use crate::{build_router, ServiceState};
use tokio::net::TcpListener;

pub struct Server {
    config: ServiceConfig,
    state: ServiceState,
}

impl Server {
    /// Connect the configured store and build the engine.
    pub async fn new(config: ServiceConfig) -> anyhow::Result<Self> {
        let state = ServiceState::bootstrap(&config).await?;
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// Serve until Ctrl+C or SIGTERM.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.server.listen_addr;
        let app = build_router(self.state.clone(), self.config.server.enable_cors);
        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            addr = %listener.local_addr()?,
            storage = self.state.engine.store_backend(),
            history_limit = self.config.distribution.history_limit,
            "slumlink-service listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("slumlink-service shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
