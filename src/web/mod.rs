//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::probe::Monitor;
use crate::targets::TargetRegistry;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Path of the per-target health route for `name`.
pub fn health_path(name: &str) -> String {
    format!("/{}_health", name)
}

/// Explicit mapping from a per-target health route to its target name.
///
/// Built once from the registry at startup and never modified.
#[derive(Debug, Default)]
pub struct HealthRoutes {
    by_path: HashMap<String, String>,
    paths: Vec<String>,
}

impl HealthRoutes {
    pub fn from_registry(registry: &TargetRegistry) -> Self {
        let mut routes = Self::default();
        for target in registry.list() {
            let path = health_path(&target.name);
            routes.by_path.insert(path.clone(), target.name.clone());
            routes.paths.push(path);
        }
        routes
    }

    pub fn target_for(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    /// Route paths in registration order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Monitor,
    pub health_routes: Arc<HealthRoutes>,
}

/// Web server for dbmonitor.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, monitor: Monitor) -> Self {
        let health_routes = Arc::new(HealthRoutes::from_registry(monitor.registry()));
        Self {
            config,
            state: AppState {
                monitor,
                health_routes,
            },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        let mut router = Router::new()
            .route("/", get(handlers::handle_index))
            .route("/health", get(handlers::handle_health))
            .route("/metrics", get(handlers::handle_metrics))
            .route("/tablespace", get(handlers::handle_tablespace))
            .route("/sessions", get(handlers::handle_sessions))
            .route("/custom", post(handlers::handle_custom));

        for path in self.state.health_routes.paths() {
            router = router.route(path, get(handlers::handle_target_health));
        }

        router
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
