//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search resolution (cache, engine selection, fallbacks)
//! - Download queue (admissions, terminal outcomes, sweeps)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search metrics
// =============================================================================

/// Search cache lookups by outcome ("hit" / "miss").
pub static SEARCH_CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "catcharr_search_cache_lookups_total",
            "Search cache lookups by outcome",
        ),
        &["outcome"],
    )
    .unwrap()
});

/// Searches executed by engine ("native" / "cli").
pub static SEARCHES_EXECUTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "catcharr_searches_total",
            "Searches executed by engine",
        ),
        &["engine"],
    )
    .unwrap()
});

/// Native-engine failures that were retried on the CLI engine. An empty
/// result after a fallback may mask an upstream outage.
pub static ENGINE_FALLBACKS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "catcharr_engine_fallbacks_total",
        "Native searches delegated to the CLI engine after an upstream failure",
    )
    .unwrap()
});

/// Searches that surfaced as empty because an engine error was swallowed.
pub static SEARCHES_SWALLOWED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "catcharr_searches_swallowed_total",
        "Search failures converted to empty result sets",
    )
    .unwrap()
});

// =============================================================================
// Queue metrics
// =============================================================================

/// Queue admissions.
pub static DOWNLOADS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "catcharr_downloads_started_total",
        "Downloads admitted to an active slot",
    )
    .unwrap()
});

/// Terminal queue outcomes ("complete" / "cancelled" / "removed" / "forwarded").
pub static DOWNLOAD_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "catcharr_download_outcomes_total",
            "Terminal download outcomes",
        ),
        &["outcome"],
    )
    .unwrap()
});

/// Stale working directories deleted by the sweep.
pub static STALE_DIRS_SWEPT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "catcharr_stale_dirs_swept_total",
        "Orphaned working directories removed",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(SEARCH_CACHE_LOOKUPS.clone()),
        Box::new(SEARCHES_EXECUTED.clone()),
        Box::new(ENGINE_FALLBACKS.clone()),
        Box::new(SEARCHES_SWALLOWED.clone()),
        Box::new(DOWNLOADS_STARTED.clone()),
        Box::new(DOWNLOAD_OUTCOMES.clone()),
        Box::new(STALE_DIRS_SWEPT.clone()),
    ]
}
