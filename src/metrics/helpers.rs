//! Metric recording helpers

use prometheus::{Encoder, TextEncoder};

use super::{
    CACHE_ENTRIES, CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, CACHE_SOFT_FAILURES_TOTAL,
    CACHE_WRITES_TOTAL, PREFETCH_LATENCY, PREFETCH_TOTAL, RENDER_RESULTS_TOTAL,
    SYNC_DECISIONS_TOTAL, SYNC_FETCHES_TOTAL,
};

/// Encode all registered metrics in Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording cache metrics
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn record_hit(kind: &str, tier: &str) {
        CACHE_HITS_TOTAL.with_label_values(&[kind, tier]).inc();
    }

    pub fn record_miss(kind: &str) {
        CACHE_MISSES_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_writes(kind: &str, count: u64) {
        CACHE_WRITES_TOTAL.with_label_values(&[kind]).inc_by(count);
    }

    /// Record a disk error that was downgraded to a miss or no-op
    pub fn record_soft_failure(kind: &str, op: &str) {
        CACHE_SOFT_FAILURES_TOTAL.with_label_values(&[kind, op]).inc();
    }

    pub fn set_entries(kind: &str, count: usize) {
        CACHE_ENTRIES.with_label_values(&[kind]).set(count as i64);
    }
}

/// Helper struct for recording sync metrics
pub struct SyncMetrics;

impl SyncMetrics {
    pub fn record_decision(kind: &str, decision: &str) {
        SYNC_DECISIONS_TOTAL.with_label_values(&[kind, decision]).inc();
    }

    pub fn record_fetch(kind: &str, path: &str, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        SYNC_FETCHES_TOTAL.with_label_values(&[kind, path, result]).inc();
    }
}

/// Helper struct for recording render metrics
pub struct RenderMetrics;

impl RenderMetrics {
    pub fn record(kind: &str, result: &str) {
        RENDER_RESULTS_TOTAL.with_label_values(&[kind, result]).inc();
    }
}

/// Helper struct for recording image prefetch metrics
pub struct PrefetchMetrics;

impl PrefetchMetrics {
    pub fn record(outcome: &str, elapsed_secs: f64) {
        PREFETCH_TOTAL.with_label_values(&[outcome]).inc();
        PREFETCH_LATENCY.observe(elapsed_secs);
    }
}
