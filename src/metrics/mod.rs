pub mod collectors;

use collectors::{ReasonLabel, RolePermissionLabel, StateLabel};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::{Family, MetricConstructor};
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

/// Constructor for session duration histograms.
#[derive(Clone)]
pub struct SessionDurationHistogramBuilder;

impl MetricConstructor<Histogram> for SessionDurationHistogramBuilder {
    fn new_metric(&self) -> Histogram {
        // Buckets: 10s, 30s, 1m, 5m, 15m, 30m, 1h, 4h
        Histogram::new([10.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 14400.0].into_iter())
    }
}

/// Terminal session metrics. Label sets are bounded: states, failure
/// reasons and the static role/permission table.
pub struct MetricsRegistry {
    pub registry: Registry,
    pub sessions_active: Gauge,
    pub sessions_total: Counter,
    pub messages_total: Family<StateLabel, Counter>,
    pub login_failures_total: Family<ReasonLabel, Counter>,
    pub lockouts_total: Counter,
    pub permission_denials_total: Family<RolePermissionLabel, Counter>,
    pub session_duration_seconds: Family<StateLabel, Histogram, SessionDurationHistogramBuilder>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let sessions_active = Gauge::default();
        registry.register(
            "invterm_sessions_active",
            "Currently connected terminal sessions",
            sessions_active.clone(),
        );

        let sessions_total = Counter::default();
        registry.register(
            "invterm_sessions",
            "Terminal sessions opened since start",
            sessions_total.clone(),
        );

        let messages_total = Family::<StateLabel, Counter>::default();
        registry.register(
            "invterm_messages",
            "Input lines processed, by the state that handled them",
            messages_total.clone(),
        );

        let login_failures_total = Family::<ReasonLabel, Counter>::default();
        registry.register(
            "invterm_login_failures",
            "Rejected logins",
            login_failures_total.clone(),
        );

        let lockouts_total = Counter::default();
        registry.register(
            "invterm_lockouts",
            "Connections closed after too many failed logins",
            lockouts_total.clone(),
        );

        let permission_denials_total = Family::<RolePermissionLabel, Counter>::default();
        registry.register(
            "invterm_permission_denials",
            "Menu options refused by the role guard",
            permission_denials_total.clone(),
        );

        let session_duration_seconds =
            Family::<StateLabel, Histogram, SessionDurationHistogramBuilder>::new_with_constructor(
                SessionDurationHistogramBuilder,
            );
        registry.register(
            "invterm_session_duration_seconds",
            "Session lifetime, by the state the session ended in",
            session_duration_seconds.clone(),
        );

        Self {
            registry,
            sessions_active,
            sessions_total,
            messages_total,
            login_failures_total,
            lockouts_total,
            permission_denials_total,
            session_duration_seconds,
        }
    }

    pub fn record_session_opened(&self) {
        self.sessions_total.inc();
        self.sessions_active.inc();
    }

    pub fn record_session_closed(&self, final_state: &str, duration_secs: f64) {
        self.sessions_active.dec();
        self.session_duration_seconds
            .get_or_create(&StateLabel {
                state: final_state.to_string(),
            })
            .observe(duration_secs);
    }

    pub fn record_message(&self, state: &str) {
        self.messages_total
            .get_or_create(&StateLabel {
                state: state.to_string(),
            })
            .inc();
    }

    pub fn record_login_failure(&self, reason: &str) {
        self.login_failures_total
            .get_or_create(&ReasonLabel {
                reason: reason.to_string(),
            })
            .inc();
    }

    pub fn record_lockout(&self) {
        self.lockouts_total.inc();
    }

    pub fn record_permission_denied(&self, role: &str, permission: &str) {
        self.permission_denials_total
            .get_or_create(&RolePermissionLabel {
                role: role.to_string(),
                permission: permission.to_string(),
            })
            .inc();
    }

    /// Render the registry in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
