//! Cache metrics for observability

use prometheus::{CounterVec, IntGauge, Opts, Registry};
use std::sync::OnceLock;

use crate::keys::CacheKey;
use crate::state::BackendMode;

static METRICS: OnceLock<CacheMetricsInner> = OnceLock::new();

struct CacheMetricsInner {
    operations: CounterVec,
    hits: CounterVec,
    misses: CounterVec,
    mode_transitions: CounterVec,
    remote_active: IntGauge,
}

impl CacheMetricsInner {
    fn new() -> Self {
        Self {
            operations: CounterVec::new(
                Opts::new(
                    "stream_cache_operations_total",
                    "Cache operations by backend and outcome",
                ),
                &["op", "backend", "outcome"],
            )
            .expect("valid metric definition"),
            hits: CounterVec::new(
                Opts::new("stream_cache_hits_total", "Total cache hits"),
                &["entity"],
            )
            .expect("valid metric definition"),
            misses: CounterVec::new(
                Opts::new("stream_cache_misses_total", "Total cache misses"),
                &["entity"],
            )
            .expect("valid metric definition"),
            mode_transitions: CounterVec::new(
                Opts::new(
                    "stream_cache_mode_transitions_total",
                    "Backend mode transitions",
                ),
                &["to"],
            )
            .expect("valid metric definition"),
            remote_active: IntGauge::new(
                "stream_cache_remote_active",
                "1 while the remote store serves requests, 0 in fallback",
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.operations.clone()))?;
        registry.register(Box::new(self.hits.clone()))?;
        registry.register(Box::new(self.misses.clone()))?;
        registry.register(Box::new(self.mode_transitions.clone()))?;
        registry.register(Box::new(self.remote_active.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static CacheMetricsInner {
    METRICS.get_or_init(CacheMetricsInner::new)
}

fn extract_entity(key: &str) -> &str {
    CacheKey::entity_type(key).unwrap_or("unknown")
}

/// Cache metrics wrapper
#[derive(Clone, Default)]
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_operation(&self, op: &str, backend: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        get_metrics()
            .operations
            .with_label_values(&[op, backend, outcome])
            .inc();
    }

    pub fn record_hit(&self, key: &str) {
        let entity = extract_entity(key);
        get_metrics().hits.with_label_values(&[entity]).inc();
    }

    pub fn record_miss(&self, key: &str) {
        let entity = extract_entity(key);
        get_metrics().misses.with_label_values(&[entity]).inc();
    }

    pub fn record_mode(&self, mode: BackendMode) {
        let metrics = get_metrics();
        metrics
            .mode_transitions
            .with_label_values(&[mode.as_str()])
            .inc();
        metrics.remote_active.set(i64::from(mode.is_connected()));
    }
}
