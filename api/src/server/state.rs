use std::sync::Arc;

use crate::config::{AppConfig, SimulationConfig};
use crate::context::{ContextResolver, resolve_hostname};
use crate::health::Readiness;
use crate::logging::{EventSink, LogTags};
use crate::middleware::{HttpMetricsObserver, ResponseObserver};
use crate::tasks::BackgroundTasks;

/// Shared state of the router. Cloned per request; every field is shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub resolver: Arc<ContextResolver>,
    pub tags: Arc<LogTags>,
    pub sink: Arc<dyn EventSink>,
    pub tasks: BackgroundTasks,
    /// Observers run after the per-request completion logger
    pub observers: Arc<[Arc<dyn ResponseObserver>]>,
    pub readiness: Readiness,
}

impl AppState {
    pub fn from_config(config: AppConfig, sink: Arc<dyn EventSink>) -> Self {
        let resolver =
            ContextResolver::new(config.telemetry.service_name.clone(), resolve_hostname());
        let tags = LogTags::new(
            config.app.logger_name.clone(),
            config.app.name.clone(),
            config.telemetry.environment.clone(),
        );
        let observers: Vec<Arc<dyn ResponseObserver>> = vec![Arc::new(HttpMetricsObserver)];

        Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            tags: Arc::new(tags),
            sink,
            tasks: BackgroundTasks::new(),
            observers: observers.into(),
            readiness: Readiness::new(),
        }
    }

    pub fn simulation(&self) -> &SimulationConfig {
        &self.config.simulation
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.resolver.service())
            .field("hostname", &self.resolver.hostname())
            .field("tags", &self.tags)
            .field("observers", &self.observers.len())
            .field("in_flight_tasks", &self.tasks.in_flight())
            .finish()
    }
}
