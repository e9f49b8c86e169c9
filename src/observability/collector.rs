use super::WorkerMetrics;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub worker_id: usize,
    pub batches_processed: u64,
    pub batches_failed: u64,
    pub records_encoded: u64,
    pub avg_batch_latency_us: u64,
}

/// Aggregates per-worker metrics for the pool
#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: BTreeMap<usize, Arc<WorkerMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: BTreeMap::new(),
        }
    }

    /// Creates and registers metrics for a worker
    pub fn register(&mut self, worker_id: usize) -> Arc<WorkerMetrics> {
        let metrics = Arc::new(WorkerMetrics::new(worker_id));
        self.metrics.insert(worker_id, metrics.clone());
        metrics
    }

    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        self.metrics
            .values()
            .map(|m| MetricsSnapshot {
                worker_id: m.worker_id(),
                batches_processed: m.batches_processed(),
                batches_failed: m.batches_failed(),
                records_encoded: m.records_encoded(),
                avg_batch_latency_us: m.avg_batch_latency_us(),
            })
            .collect()
    }

    pub fn total_processed(&self) -> u64 {
        self.metrics.values().map(|m| m.batches_processed()).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.metrics.values().map(|m| m.batches_failed()).sum()
    }

    pub fn get_worker_metrics(&self, worker_id: usize) -> Option<Arc<WorkerMetrics>> {
        self.metrics.get(&worker_id).cloned()
    }
}
