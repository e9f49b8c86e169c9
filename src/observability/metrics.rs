use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic counters for one encode worker
pub struct WorkerMetrics {
    worker_id: usize,
    batches_processed: AtomicU64,
    batches_failed: AtomicU64,
    records_encoded: AtomicU64,
    total_latency_us: AtomicU64,
    latency_samples: AtomicU64,
}

impl WorkerMetrics {
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            batches_processed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            records_encoded: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn batches_processed(&self) -> u64 {
        self.batches_processed.load(Ordering::Relaxed)
    }

    pub fn batches_failed(&self) -> u64 {
        self.batches_failed.load(Ordering::Relaxed)
    }

    pub fn records_encoded(&self) -> u64 {
        self.records_encoded.load(Ordering::Relaxed)
    }

    pub fn record_batch_processed(&self, records: usize) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.records_encoded.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_batch(&self) -> Instant {
        Instant::now()
    }

    pub fn finish_batch(&self, start: Instant) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_batch_latency_us(&self) -> u64 {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_latency_us.load(Ordering::Relaxed) / samples
    }
}
