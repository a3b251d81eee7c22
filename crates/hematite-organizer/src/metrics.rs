//! # Organizer Metrics
//!
//! Prometheus metrics for monitoring chain organization.
//!
//! Enable with the `metrics` feature:
//! ```toml
//! hematite-organizer = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `organizer_blocks_organized_total` - Counter of accepted blocks
//! - `organizer_blocks_rejected_total` - Counter of rejected blocks (by reason)
//! - `organizer_reorganizations_total` - Counter of committed reorganizations
//! - `organizer_organize_latency_seconds` - Histogram of organize times

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Histogram,
    IntCounter,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total blocks that completed organization
    pub static ref BLOCKS_ORGANIZED: IntCounter = register_int_counter!(
        "organizer_blocks_organized_total",
        "Total number of blocks that completed organization"
    )
    .expect("Failed to create BLOCKS_ORGANIZED metric");

    /// Total blocks rejected, labeled by rejection reason
    pub static ref BLOCKS_REJECTED: CounterVec = register_counter_vec!(
        "organizer_blocks_rejected_total",
        "Total number of blocks rejected",
        &["reason"]
    )
    .expect("Failed to create BLOCKS_REJECTED metric");

    /// Total committed reorganizations
    pub static ref REORGANIZATIONS: IntCounter = register_int_counter!(
        "organizer_reorganizations_total",
        "Total number of committed reorganizations"
    )
    .expect("Failed to create REORGANIZATIONS metric");

    /// Histogram of organize latency
    pub static ref ORGANIZE_LATENCY: Histogram = register_histogram!(
        "organizer_organize_latency_seconds",
        "Time taken to organize a block in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to create ORGANIZE_LATENCY metric");
}

/// Record a block that completed organization
#[cfg(feature = "metrics")]
pub fn record_block_organized() {
    BLOCKS_ORGANIZED.inc();
}

/// Record a rejected block with reason
#[cfg(feature = "metrics")]
pub fn record_block_rejected(reason: &str) {
    BLOCKS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a committed reorganization
#[cfg(feature = "metrics")]
pub fn record_reorganization() {
    REORGANIZATIONS.inc();
}

/// Record organize latency
#[cfg(feature = "metrics")]
pub fn record_organize_latency(seconds: f64) {
    ORGANIZE_LATENCY.observe(seconds);
}

// No-op implementations when metrics feature is disabled

#[cfg(not(feature = "metrics"))]
pub fn record_block_organized() {}

#[cfg(not(feature = "metrics"))]
pub fn record_block_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_reorganization() {}

#[cfg(not(feature = "metrics"))]
pub fn record_organize_latency(_seconds: f64) {}
