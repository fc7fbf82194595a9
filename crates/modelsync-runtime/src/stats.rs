#![forbid(unsafe_code)]

//! Process-wide diagnostics counters.
//!
//! Cheap relaxed atomics, readable at any time for telemetry. They count
//! across every engine instance in the process.

use std::sync::atomic::{AtomicU64, Ordering};

static PUBLISHES_TOTAL: AtomicU64 = AtomicU64::new(0);
static DELIVERIES_TOTAL: AtomicU64 = AtomicU64::new(0);
static DELIVERIES_SUPERSEDED_TOTAL: AtomicU64 = AtomicU64::new(0);
static CRITICAL_ERRORS_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Publishes and deletes processed by worker queues.
#[must_use]
pub fn publishes_total() -> u64 {
    PUBLISHES_TOTAL.load(Ordering::Relaxed)
}

/// Updates handed to `on_model_updated` (resume deliveries included).
#[must_use]
pub fn deliveries_total() -> u64 {
    DELIVERIES_TOTAL.load(Ordering::Relaxed)
}

/// Deliveries dropped because a newer publish superseded them.
#[must_use]
pub fn deliveries_superseded_total() -> u64 {
    DELIVERIES_SUPERSEDED_TOTAL.load(Ordering::Relaxed)
}

/// Caller-contract violations reported through delegates.
#[must_use]
pub fn critical_errors_total() -> u64 {
    CRITICAL_ERRORS_TOTAL.load(Ordering::Relaxed)
}

pub(crate) fn record_publish() {
    PUBLISHES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_delivery() {
    DELIVERIES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_superseded() {
    DELIVERIES_SUPERSEDED_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_critical_error() {
    CRITICAL_ERRORS_TOTAL.fetch_add(1, Ordering::Relaxed);
}
