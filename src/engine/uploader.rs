use super::queue::{PopTimeout, QueueConsumer};
use crate::core::EncodedBatch;
use crate::dataset::Dataset;
use crate::error::StorageError;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// When buffered writes are forced to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Flush once this many records have been written since the last flush
    pub every_records: usize,
    /// Flush at least this often while results keep arriving or the queue is idle
    pub interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            every_records: 256,
            interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub results_written: u64,
    pub records_written: u64,
    pub results_dropped: u64,
    pub flushes: u64,
}

/// The only writer of the output dataset.
///
/// Owning the `Dataset` by value keeps every other task from writing to it.
pub struct Uploader {
    dataset: Dataset,
    policy: FlushPolicy,
    unflushed: usize,
    last_flush: Instant,
    report: UploadReport,
}

impl Uploader {
    pub fn new(dataset: Dataset, policy: FlushPolicy) -> Self {
        Self {
            dataset,
            policy: FlushPolicy {
                every_records: policy.every_records.max(1),
                interval: policy.interval,
            },
            unflushed: 0,
            last_flush: Instant::now(),
            report: UploadReport::default(),
        }
    }

    /// Writes results until every producer is gone and the queue is drained,
    /// then flushes once more and hands the dataset back.
    pub fn run(
        mut self,
        results: QueueConsumer<EncodedBatch>,
    ) -> Result<(Dataset, UploadReport), StorageError> {
        info!(path = %self.dataset.path().display(), "uploader started");

        loop {
            match results.pop_timeout(self.policy.interval) {
                PopTimeout::Item(result) => self.upload(result),
                PopTimeout::Idle => {}
                PopTimeout::Closed => break,
            }

            if self.flush_due() {
                // A failed periodic flush is retried by the next one
                if let Err(e) = self.flush() {
                    error!(error = %e, "periodic flush failed");
                }
            }
        }

        self.flush()?;
        info!(
            results_written = self.report.results_written,
            records_written = self.report.records_written,
            results_dropped = self.report.results_dropped,
            flushes = self.report.flushes,
            "upload queue drained, uploader exiting"
        );
        Ok((self.dataset, self.report))
    }

    /// Writes one result whole, or drops it whole.
    pub fn upload(&mut self, result: EncodedBatch) {
        for record in &result.records {
            if let Err(e) = self.dataset.validate(record.record_index, &record.fields) {
                self.report.results_dropped += 1;
                error!(
                    batch_id = result.batch_id,
                    record_index = record.record_index,
                    error = %e,
                    "rejected result, dropping it; its records stay pending"
                );
                return;
            }
        }

        for record in &result.records {
            if let Err(e) = self.dataset.write(record.record_index, &record.fields) {
                // Unreachable after validation; counted so the run reports incomplete
                self.report.results_dropped += 1;
                error!(batch_id = result.batch_id, error = %e, "write failed after validation");
                return;
            }
        }

        self.unflushed += result.len();
        self.report.results_written += 1;
        self.report.records_written += result.len() as u64;
        debug!(batch_id = result.batch_id, records = result.len(), "uploaded result");
    }

    pub fn report(&self) -> UploadReport {
        self.report
    }

    fn flush_due(&self) -> bool {
        self.unflushed > 0
            && (self.unflushed >= self.policy.every_records
                || self.last_flush.elapsed() >= self.policy.interval)
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.dataset.flush()?;
        self.report.flushes += 1;
        self.unflushed = 0;
        self.last_flush = Instant::now();
        Ok(())
    }
}
