use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub struct WorkerMetrics {
    // Counters
    received: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    rejected: AtomicUsize,
    publish_failures: AtomicUsize,

    // Timing (in microseconds), completed + failed jobs
    total_processing_time_us: AtomicU64,

    // Counts
    total_entities: AtomicUsize,
    total_relationships: AtomicUsize,
}

impl WorkerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            received: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            publish_failures: AtomicUsize::new(0),
            total_processing_time_us: AtomicU64::new(0),
            total_entities: AtomicUsize::new(0),
            total_relationships: AtomicUsize::new(0),
        })
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self, duration: Duration, entities: usize, relationships: usize) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.total_entities.fetch_add(entities, Ordering::Relaxed);
        self.total_relationships.fetch_add(relationships, Ordering::Relaxed);
    }

    pub fn record_failed(&self, duration: Duration) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let processed = completed + failed;
        let total_us = self.total_processing_time_us.load(Ordering::Relaxed) as f64;

        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            completed,
            failed,
            rejected: self.rejected.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            avg_processing_time_ms: if processed > 0 {
                total_us / processed as f64 / 1000.0 // Convert to ms
            } else {
                0.0
            },
            total_entities: self.total_entities.load(Ordering::Relaxed),
            total_relationships: self.total_relationships.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub received: usize,
    pub completed: usize,
    pub failed: usize,
    pub rejected: usize,
    pub publish_failures: usize,
    pub avg_processing_time_ms: f64,
    pub total_entities: usize,
    pub total_relationships: usize,
}
