//! ServerBuilder for fluent API to build HTTP servers

use super::handlers::AppState;
use super::router::{build_routes, health_routes};
use crate::config::ObserversConfig;
use crate::core::error::ObserversError;
use crate::core::store::DocumentStore;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for creating HTTP servers
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_store(InMemoryDocumentStore::new().with_collection("topics"))
///     .with_config(ObserversConfig::from_yaml_file("observers.yaml")?)
///     .build()?;
/// ```
pub struct ServerBuilder {
    store: Option<Arc<dyn DocumentStore>>,
    config: Option<ObserversConfig>,
    custom_routes: Vec<Router>,
    permissive_cors: bool,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            store: None,
            config: None,
            custom_routes: Vec::new(),
            permissive_cors: false,
        }
    }

    /// Set the document store (required)
    pub fn with_store(mut self, store: impl DocumentStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set an already shared document store
    pub fn with_shared_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the configuration (defaults to [`ObserversConfig::default_config`])
    pub fn with_config(mut self, config: ObserversConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this for routes outside the query layer, such as authentication
    /// or page rendering.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Allow cross-origin requests from any origin
    pub fn with_permissive_cors(mut self) -> Self {
        self.permissive_cors = true;
        self
    }

    /// Build the shared handler state
    pub fn build_state(&mut self) -> Result<AppState> {
        let store = self
            .store
            .take()
            .ok_or_else(|| anyhow::anyhow!("DocumentStore is required. Call .with_store()"))?;

        let config = self.config.take().unwrap_or_default();
        config
            .validate()
            .map_err(|e| ObserversError::Config(e.to_string()))?;

        Ok(AppState::new(store, Arc::new(config)))
    }

    /// Build the final router
    pub fn build(mut self) -> Result<Router> {
        let state = self.build_state()?;

        let mut app = health_routes().merge(build_routes(state));
        for custom_router in std::mem::take(&mut self.custom_routes) {
            app = app.merge(custom_router);
        }

        if self.permissive_cors {
            app = app.layer(CorsLayer::permissive());
        }

        Ok(app.layer(TraceLayer::new_for_http()))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
