use super::queue;
use super::state::PoolState;
use super::uploader::Uploader;
use super::worker::{EncodeWorker, WorkerReport};
use crate::config::PipelineConfig;
use crate::core::{Batch, EncodedBatch};
use crate::dataset::Dataset;
use crate::encoder::{EncoderFactory, WorkerContext};
use crate::error::{ConfigurationError, PipelineError};
use crate::observability::{MetricsCollector, PoolMonitor};
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of one pool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches_total: u64,
    pub batches_succeeded: u64,
    pub batches_failed: u64,
    /// Left in the work queue because every worker exited early
    pub batches_unclaimed: u64,
    pub results_written: u64,
    pub results_dropped: u64,
    pub records_written: u64,
}

impl RunSummary {
    /// True when every assembled batch reached the dataset.
    pub fn is_complete(&self) -> bool {
        self.batches_failed == 0 && self.batches_unclaimed == 0 && self.results_dropped == 0
    }
}

/// Owns the queues, the workers and the uploader for one run.
///
/// The work queue is filled once and closed before any worker starts, so an
/// empty queue means the run is over. The upload queue closes when the last
/// worker exits, which is what lets the uploader finish.
pub struct PoolCoordinator {
    config: PipelineConfig,
    factory: Arc<dyn EncoderFactory>,
    state: PoolState,
    metrics: MetricsCollector,
}

impl PoolCoordinator {
    pub fn new(
        config: PipelineConfig,
        factory: Arc<dyn EncoderFactory>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            state: PoolState::Init,
            metrics: MetricsCollector::new(),
        })
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn monitor(&self) -> PoolMonitor {
        PoolMonitor::new(self.metrics.clone())
    }

    /// Transition to a new state with validation
    fn transition_to(&mut self, next: PoolState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state.name(),
                to: next.name(),
            });
        }
        info!(from = self.state.name(), to = next.name(), "pool state");
        self.state = next;
        Ok(())
    }

    /// Encodes every batch and writes the results into `dataset`.
    ///
    /// Returns the dataset once the uploader has flushed its last write.
    pub async fn run(
        &mut self,
        dataset: Dataset,
        batches: Vec<Batch>,
    ) -> Result<(Dataset, RunSummary), PipelineError> {
        if self.state != PoolState::Init {
            return Err(PipelineError::InvalidTransition {
                from: self.state.name(),
                to: PoolState::Running.name(),
            });
        }
        self.log_cluster_resources();

        let batches_total = batches.len() as u64;
        let (work_tx, work_rx) = queue::unbounded::<Batch>();
        for batch in batches {
            if let Err(batch) = work_tx.push(batch) {
                error!(batch_id = batch.id, "work queue closed while filling, batch dropped");
            }
        }
        info!(batches = work_tx.size(), "work queue filled");
        work_tx.close();

        let (upload_tx, upload_rx) = queue::unbounded::<EncodedBatch>();
        let uploader = Uploader::new(dataset, self.config.flush_policy());
        let uploader_handle = tokio::task::spawn_blocking(move || uploader.run(upload_rx));

        self.transition_to(PoolState::Running)?;

        let policy = self.config.failure_policy();
        let mut worker_handles = Vec::with_capacity(self.config.num_parallel_workers);
        for worker_id in 0..self.config.num_parallel_workers {
            let ctx = WorkerContext::place(
                worker_id,
                self.config.accelerator_fraction_per_worker,
                self.config.num_accelerators,
            );
            let worker = EncodeWorker::new(
                ctx,
                self.config.schema,
                policy,
                self.metrics.register(worker_id),
            );
            let factory = self.factory.clone();
            let work = work_rx.clone();
            let upload = upload_tx.clone();

            worker_handles.push(tokio::task::spawn_blocking(move || {
                worker.run(factory.as_ref(), work, upload)
            }));
        }
        // Only workers hold producers now
        drop(upload_tx);

        let mut reports: Vec<WorkerReport> = Vec::with_capacity(worker_handles.len());
        for handle in worker_handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "encode worker task failed"),
            }
        }

        self.transition_to(PoolState::Draining)?;

        let mut batches_unclaimed = 0u64;
        while work_rx.try_pop().is_some() {
            batches_unclaimed += 1;
        }
        if batches_unclaimed > 0 {
            error!(batches_unclaimed, "workers exited with batches left in the queue");
        }
        drop(work_rx);

        info!("all workers finished, waiting for uploader");
        let (dataset, upload) = uploader_handle.await??;

        self.transition_to(PoolState::Done)?;

        let summary = RunSummary {
            batches_total,
            batches_succeeded: reports.iter().map(|r| r.batches_processed).sum(),
            batches_failed: reports.iter().map(|r| r.batches_failed).sum(),
            batches_unclaimed,
            results_written: upload.results_written,
            results_dropped: upload.results_dropped,
            records_written: upload.records_written,
        };
        info!(
            batches_total = summary.batches_total,
            batches_succeeded = summary.batches_succeeded,
            batches_failed = summary.batches_failed,
            batches_unclaimed = summary.batches_unclaimed,
            records_written = summary.records_written,
            "run finished"
        );
        info!("\n{}", self.monitor().generate_report());

        Ok((dataset, summary))
    }

    fn log_cluster_resources(&self) {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        info!(
            cpus,
            accelerators = self.config.num_accelerators,
            workers = self.config.num_parallel_workers,
            accelerator_fraction_per_worker = self.config.accelerator_fraction_per_worker,
            requested_accelerators =
                self.config.accelerator_fraction_per_worker * self.config.num_parallel_workers as f64,
            "cluster resources"
        );
    }
}
