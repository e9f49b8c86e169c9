use crate::core::{Batch, BatchEntry};
use crate::dataset::Dataset;
use crate::error::{ConfigurationError, EmptyWorkError};
use std::time::Instant;
use tracing::info;

/// Outcome of one scan over the dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub batches: Vec<Batch>,

    /// Records visited
    pub scanned: u64,

    /// Records skipped because they were already processed
    pub already_done: u64,

    /// Records placed into a batch
    pub included: u64,
}

impl Assembly {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Hands out the batches, or reports that there is nothing to do.
    pub fn require_work(self) -> Result<Vec<Batch>, EmptyWorkError> {
        if self.batches.is_empty() {
            return Err(EmptyWorkError {
                scanned: self.scanned,
                already_done: self.already_done,
            });
        }
        Ok(self.batches)
    }
}

/// Groups pending records into fixed-size batches keyed by source file.
///
/// Videos have different lengths, so batches span several files to keep the
/// number of segments per encoder call constant.
#[derive(Debug, Clone, Copy)]
pub struct BatchAssembler {
    batch_size: usize,
    resume_mode: bool,
}

impl BatchAssembler {
    pub fn new(batch_size: usize, resume_mode: bool) -> Result<Self, ConfigurationError> {
        if batch_size == 0 {
            return Err(ConfigurationError::InvalidBatchSize(batch_size));
        }
        Ok(Self {
            batch_size,
            resume_mode,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Scans every record once. In resume mode, completed records are skipped.
    pub fn assemble(&self, dataset: &Dataset) -> Assembly {
        let start = Instant::now();
        let mut assembly = Assembly::default();
        let mut open = Batch::new(0);
        let mut open_len = 0usize;

        for record in dataset.iter() {
            assembly.scanned += 1;
            if self.resume_mode && !dataset.is_pending(&record) {
                assembly.already_done += 1;
                continue;
            }

            let meta = record.meta();
            open.push(
                &meta.video_filepath,
                BatchEntry {
                    timestamp: meta.midpoint(),
                    record_index: record.index(),
                    caption: meta.caption.clone(),
                },
            );
            open_len += 1;
            assembly.included += 1;

            if open_len == self.batch_size {
                let next_id = open.id + 1;
                assembly
                    .batches
                    .push(std::mem::replace(&mut open, Batch::new(next_id)));
                open_len = 0;
            }
        }

        // Last batch may be smaller than batch_size
        if open_len > 0 {
            assembly.batches.push(open);
        }

        info!(
            scanned = assembly.scanned,
            already_done = assembly.already_done,
            to_process = assembly.included,
            batches = assembly.batches.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "assembled batches"
        );

        assembly
    }
}
