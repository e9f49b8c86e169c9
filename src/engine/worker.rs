use super::queue::{QueueConsumer, QueueProducer};
use crate::core::{Batch, EncodedBatch, EncodedRecord, OutputFields, Tensor};
use crate::dataset::{OutputShape, FRAMES, LAST_HIDDEN_STATES, POOLED_EMBEDDING, TIMESTAMP};
use crate::encoder::{EncoderFactory, FrameDecoder, SegmentEncoder, WorkerContext};
use crate::error::EncodeError;
use crate::observability::WorkerMetrics;
use crate::resilience::{catch_encode_panic, FailurePolicy};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Final counts of one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub batches_processed: u64,
    pub batches_failed: u64,
    pub records_encoded: u64,
}

/// Pulls batches from the work queue and pushes whole results to the upload queue
pub struct EncodeWorker {
    ctx: WorkerContext,
    shape: OutputShape,
    policy: FailurePolicy,
    metrics: Arc<WorkerMetrics>,
}

impl EncodeWorker {
    pub fn new(
        ctx: WorkerContext,
        shape: OutputShape,
        policy: FailurePolicy,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        Self {
            ctx,
            shape,
            policy,
            metrics,
        }
    }

    /// Runs until the work queue is closed and empty.
    ///
    /// A failed batch is logged and dropped; the loop moves on to the next one.
    pub fn run(
        self,
        factory: &dyn EncoderFactory,
        work: QueueConsumer<Batch>,
        upload: QueueProducer<EncodedBatch>,
    ) -> WorkerReport {
        let worker_id = self.ctx.worker_id;

        let stages = factory
            .decoder(&self.ctx)
            .and_then(|decoder| Ok((decoder, factory.encoder(&self.ctx)?)));
        let (mut decoder, mut encoder) = match stages {
            Ok(stages) => stages,
            Err(e) => {
                error!(worker_id, error = %e, "failed to build encoder, worker exiting");
                return self.report();
            }
        };

        info!(
            worker_id,
            device = self.ctx.device,
            accelerator_fraction = self.ctx.accelerator_fraction,
            "encode worker started"
        );

        while let Some(batch) = work.pop() {
            let start = self.metrics.start_batch();

            match self.process(&batch, decoder.as_mut(), encoder.as_mut()) {
                Ok(result) => {
                    let records = result.len();
                    if upload.push(result).is_err() {
                        self.metrics.record_batch_failed();
                        error!(worker_id, batch_id = batch.id, "upload queue closed, dropping result");
                        continue;
                    }
                    self.metrics.finish_batch(start);
                    self.metrics.record_batch_processed(records);

                    let elapsed = start.elapsed().as_secs_f64();
                    info!(
                        worker_id,
                        batch_id = batch.id,
                        records,
                        elapsed_secs = elapsed,
                        secs_per_segment = elapsed / records.max(1) as f64,
                        remaining = work.size(),
                        "encoded batch"
                    );
                }
                Err(e) => {
                    self.metrics.record_batch_failed();
                    error!(
                        worker_id,
                        batch_id = batch.id,
                        sources = ?batch.source_files(),
                        timestamps = ?batch.timestamps(),
                        error = %e,
                        "batch failed, dropping it; its records stay pending"
                    );
                }
            }
        }

        info!(worker_id, "work queue empty, worker exiting");
        self.report()
    }

    fn process(
        &self,
        batch: &Batch,
        decoder: &mut dyn FrameDecoder,
        encoder: &mut dyn SegmentEncoder,
    ) -> Result<EncodedBatch, EncodeError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;
        loop {
            let outcome =
                catch_encode_panic(|| encode_batch(batch, &self.shape, &mut *decoder, &mut *encoder));
            match outcome {
                Ok(result) => return Ok(result),
                Err(e) if attempt < max_attempts => {
                    warn!(
                        worker_id = self.ctx.worker_id,
                        batch_id = batch.id,
                        attempt,
                        error = %e,
                        "batch failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn report(&self) -> WorkerReport {
        WorkerReport {
            worker_id: self.ctx.worker_id,
            batches_processed: self.metrics.batches_processed(),
            batches_failed: self.metrics.batches_failed(),
            records_encoded: self.metrics.records_encoded(),
        }
    }
}

/// Encodes every entry of `batch`, decoding each source file once.
///
/// Either every entry succeeds and a whole result is returned, or the first
/// error is returned and nothing is kept.
pub fn encode_batch(
    batch: &Batch,
    shape: &OutputShape,
    decoder: &mut dyn FrameDecoder,
    encoder: &mut dyn SegmentEncoder,
) -> Result<EncodedBatch, EncodeError> {
    let mut records = Vec::with_capacity(batch.len());

    for (source, entries) in &batch.sources {
        let timestamps: Vec<f64> = entries.iter().map(|e| e.timestamp).collect();
        let frames = decoder.decode(source, &timestamps)?;
        if frames.len() != entries.len() {
            return Err(EncodeError::FrameCount {
                source_file: source.clone(),
                expected: entries.len(),
                actual: frames.len(),
            });
        }

        for (entry, frame) in entries.iter().zip(frames) {
            check_shape("frame", &shape.frame(), frame.shape())?;

            let embedding = encoder.encode(std::slice::from_ref(&frame), &entry.caption)?;
            check_shape("pooled embedding", &shape.pooled(), embedding.pooled.shape())?;
            check_shape(
                "hidden states",
                &shape.hidden_states(),
                embedding.hidden_states.shape(),
            )?;

            let pooled = Tensor::F32(embedding.pooled.into_dyn());
            if pooled.is_zero() {
                warn!(
                    record_index = entry.record_index,
                    "encoder returned an all-zero embedding, record will still read as pending"
                );
            }

            let mut fields = OutputFields::new();
            fields.insert(POOLED_EMBEDDING.to_string(), pooled);
            fields.insert(
                LAST_HIDDEN_STATES.to_string(),
                Tensor::F32(embedding.hidden_states.into_dyn()),
            );
            fields.insert(FRAMES.to_string(), Tensor::U8(frame.into_dyn()));
            fields.insert(TIMESTAMP.to_string(), Tensor::scalar(entry.timestamp));

            records.push(EncodedRecord {
                record_index: entry.record_index,
                timestamp: entry.timestamp,
                fields,
            });
        }
    }

    Ok(EncodedBatch {
        batch_id: batch.id,
        records,
    })
}

fn check_shape(output: &'static str, expected: &[usize], actual: &[usize]) -> Result<(), EncodeError> {
    if expected != actual {
        return Err(EncodeError::OutputShape {
            output,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BatchEntry;
    use crate::encoder::synthetic::{SyntheticDecoder, SyntheticEncoder};
    use crate::encoder::{Embedding, Frame};

    fn shape() -> OutputShape {
        OutputShape {
            embedding_dim: 4,
            hidden_len: 2,
            frame_height: 3,
            frame_width: 3,
        }
    }

    fn batch() -> Batch {
        let mut batch = Batch::new(5);
        for (i, source) in ["a.mp4", "a.mp4", "b.mp4"].iter().enumerate() {
            batch.push(
                source,
                BatchEntry {
                    timestamp: i as f64 + 0.5,
                    record_index: i as u64,
                    caption: format!("caption {}", i),
                },
            );
        }
        batch
    }

    /// Counts decode calls per source
    struct CountingDecoder {
        inner: SyntheticDecoder,
        calls: Vec<(String, usize)>,
    }

    impl FrameDecoder for CountingDecoder {
        fn decode(&mut self, source: &str, timestamps: &[f64]) -> Result<Vec<Frame>, EncodeError> {
            self.calls.push((source.to_string(), timestamps.len()));
            self.inner.decode(source, timestamps)
        }
    }

    struct WrongShapeEncoder;

    impl SegmentEncoder for WrongShapeEncoder {
        fn encode(&mut self, _frames: &[Frame], _caption: &str) -> Result<Embedding, EncodeError> {
            Ok(Embedding {
                pooled: ndarray::Array1::ones(7),
                hidden_states: ndarray::Array2::ones((2, 4)),
            })
        }
    }

    #[test]
    fn test_decodes_each_source_once() {
        let mut decoder = CountingDecoder {
            inner: SyntheticDecoder::new(&shape()),
            calls: Vec::new(),
        };
        let mut encoder = SyntheticEncoder::new(&shape());

        let result = encode_batch(&batch(), &shape(), &mut decoder, &mut encoder).unwrap();

        assert_eq!(result.batch_id, 5);
        assert_eq!(result.len(), 3);
        assert_eq!(
            decoder.calls,
            vec![("a.mp4".to_string(), 2), ("b.mp4".to_string(), 1)]
        );

        let first = &result.records[0];
        assert_eq!(first.fields.len(), 4);
        assert_eq!(first.fields[TIMESTAMP].as_scalar(), Some(0.5));
    }

    #[test]
    fn test_wrong_output_shape_fails_whole_batch() {
        let mut decoder = SyntheticDecoder::new(&shape());
        let err = encode_batch(&batch(), &shape(), &mut decoder, &mut WrongShapeEncoder).unwrap_err();

        assert!(matches!(
            err,
            EncodeError::OutputShape { output: "pooled embedding", .. }
        ));
    }
}
