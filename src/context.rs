use crate::audit::AuditLogger;
use crate::auth::AuthService;
use crate::config::types::AppConfig;
use crate::features::FeatureContext;
use crate::metrics::MetricsRegistry;
use crate::reports::ReportWriter;
use crate::store::InventoryStore;
use std::sync::Arc;
use std::time::Instant;

/// Services every terminal session reaches through its handlers.
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<InventoryStore>,
    pub auth: AuthService,
    pub features: FeatureContext,
    pub audit: Arc<AuditLogger>,
    pub metrics: Arc<MetricsRegistry>,
    pub start_time: Instant,
}

impl AppContext {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<InventoryStore>,
        audit: Arc<AuditLogger>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let reports = ReportWriter::new(config.reports.output_dir.clone());
        Self {
            auth: AuthService::new(store.clone()),
            features: FeatureContext::new(store.clone(), reports),
            config,
            store,
            audit,
            metrics,
            start_time: Instant::now(),
        }
    }
}
