//! Prometheus metrics for the template cache.
//!
//! This module provides metrics for monitoring template caching and rendering:
//! - Cache metrics (hits by tier, misses, writes, soft failures)
//! - Sync metrics (fresh/refetch decisions, keyed fetch outcomes)
//! - Render metrics (result type)
//! - Image prefetch metrics (outcome, latency)

mod helpers;

pub use helpers::{encode_metrics, CacheMetrics, PrefetchMetrics, RenderMetrics, SyncMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge_vec, Histogram,
    IntCounterVec, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "template_cache";

lazy_static! {
    // ============================================================================
    // Cache Metrics
    // ============================================================================

    /// Cache hits by namespace and tier
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_hits_total", METRIC_PREFIX),
        "Template cache hits",
        &["kind", "tier"]
    ).unwrap();

    /// Cache misses (both tiers) by namespace
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_misses_total", METRIC_PREFIX),
        "Template cache misses across both tiers",
        &["kind"]
    ).unwrap();

    /// Templates written through to disk
    pub static ref CACHE_WRITES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_writes_total", METRIC_PREFIX),
        "Templates written to the cache",
        &["kind"]
    ).unwrap();

    /// Disk errors that were logged and treated as misses
    pub static ref CACHE_SOFT_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_soft_failures_total", METRIC_PREFIX),
        "Disk errors degraded to cache misses",
        &["kind", "op"]
    ).unwrap();

    /// Templates held in memory per namespace
    pub static ref CACHE_ENTRIES: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_entries", METRIC_PREFIX),
        "Templates held in the memory tier",
        &["kind"]
    ).unwrap();

    // ============================================================================
    // Sync Metrics
    // ============================================================================

    /// Token comparisons by outcome (fresh, stale)
    pub static ref SYNC_DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_sync_decisions_total", METRIC_PREFIX),
        "Template list sync decisions",
        &["kind", "decision"]
    ).unwrap();

    /// Fetches against the template source by path and result
    pub static ref SYNC_FETCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_sync_fetches_total", METRIC_PREFIX),
        "Template source fetches",
        &["kind", "path", "result"]
    ).unwrap();

    // ============================================================================
    // Render Metrics
    // ============================================================================

    /// Render attempts by result (template, reload, failed)
    pub static ref RENDER_RESULTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_render_results_total", METRIC_PREFIX),
        "Render coordinator results",
        &["kind", "result"]
    ).unwrap();

    // ============================================================================
    // Image Prefetch Metrics
    // ============================================================================

    /// Prefetch batches by outcome (success, failed, timeout)
    pub static ref PREFETCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_image_prefetch_total", METRIC_PREFIX),
        "Image prefetch batches",
        &["outcome"]
    ).unwrap();

    /// Prefetch batch latency in seconds
    pub static ref PREFETCH_LATENCY: Histogram = register_histogram!(
        format!("{}_image_prefetch_seconds", METRIC_PREFIX),
        "Image prefetch batch latency",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}
