//! # Application State
//!
//! Shared state handed to every handler: the mapper, the database its
//! rows live in, and the Prometheus handle behind `/metrics`.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use rowseal_mapper::{Database, Mapper};

/// Runtime configuration of the HTTP server.
///
/// `Debug` redacts the admin token.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind.
    pub port: u16,
    /// Bearer token for admin routes. `None` disables authentication.
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            auth_token: None,
        }
    }
}

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub mapper: Arc<Mapper>,
    pub db: Arc<dyn Database>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: AppConfig, mapper: Arc<Mapper>, db: Arc<dyn Database>) -> Self {
        Self {
            config,
            mapper,
            db,
            metrics: None,
        }
    }

    /// Serve `/metrics` from this handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("entities", &self.mapper.registry().len())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}
