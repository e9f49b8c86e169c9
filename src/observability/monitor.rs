use super::MetricsCollector;

/// Renders pool metrics as a human-readable report
pub struct PoolMonitor {
    collector: MetricsCollector,
}

impl PoolMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.collector.snapshot();

        if snapshot.is_empty() {
            return "No workers registered".to_string();
        }

        let mut report = String::from("=== Encode Pool Metrics ===\n");

        for worker in &snapshot {
            report.push_str(&format!(
                "\n[worker {}]\n  Batches: {} processed, {} failed\n  Records: {} encoded\n  Avg Batch Latency: {:.2}s\n",
                worker.worker_id,
                worker.batches_processed,
                worker.batches_failed,
                worker.records_encoded,
                worker.avg_batch_latency_us as f64 / 1_000_000.0
            ));
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
