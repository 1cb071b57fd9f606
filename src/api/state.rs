// src/api/state.rs

use parking_lot::Mutex;
use std::sync::Arc;

use crate::pipeline::{MonitoringSession, PipelineMetrics};
use crate::prediction::PredictorRegistry;
use crate::types::Config;

/// Cloned into every handler; the inner state is shared.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    registry: Arc<PredictorRegistry>,
    metrics: PipelineMetrics,
    /// Session behind the request/response endpoint and alert history
    rest_session: Arc<Mutex<MonitoringSession>>,
}

impl AppState {
    pub fn new(config: Config, registry: Arc<PredictorRegistry>) -> Self {
        let metrics = PipelineMetrics::new();
        let rest_session = MonitoringSession::new(&config, registry.clone(), metrics.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                metrics,
                rest_session: Arc::new(Mutex::new(rest_session)),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<PredictorRegistry> {
        &self.inner.registry
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.inner.metrics
    }

    pub fn rest_session(&self) -> Arc<Mutex<MonitoringSession>> {
        self.inner.rest_session.clone()
    }

    /// Fresh session for a streaming connection.
    pub fn new_session(&self) -> MonitoringSession {
        MonitoringSession::new(
            &self.inner.config,
            self.inner.registry.clone(),
            self.inner.metrics.clone(),
        )
    }
}
