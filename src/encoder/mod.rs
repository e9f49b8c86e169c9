//! Seams to the external decode and encode collaborators.
//!
//! Each worker builds its own decoder and encoder through an `EncoderFactory`,
//! so models never cross threads.

pub mod registry;
pub mod synthetic;

use crate::error::EncodeError;
use ndarray::{Array1, Array2, Array3};

pub use registry::EncoderRegistry;
pub use synthetic::SyntheticFactory;

/// One decoded RGB frame, `[height, width, 3]`
pub type Frame = Array3<u8>;

/// Encoder output for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// `[D]`
    pub pooled: Array1<f32>,
    /// `[S, D]`
    pub hidden_states: Array2<f32>,
}

/// Placement of one worker on the accelerator pool.
///
/// Passed to factories as declared intent; nothing here enforces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerContext {
    pub worker_id: usize,
    pub accelerator_fraction: f64,
    pub device: usize,
}

impl WorkerContext {
    /// Static placement: workers fill each device before moving to the next.
    pub fn place(worker_id: usize, accelerator_fraction: f64, num_accelerators: usize) -> Self {
        let per_device = (1.0 / accelerator_fraction).floor().max(1.0) as usize;
        let device = (worker_id / per_device) % num_accelerators.max(1);
        Self {
            worker_id,
            accelerator_fraction,
            device,
        }
    }
}

/// Loads frames for the requested timestamps of one source file
pub trait FrameDecoder {
    /// Returns exactly one frame per timestamp, in order.
    fn decode(&mut self, source: &str, timestamps: &[f64]) -> Result<Vec<Frame>, EncodeError>;
}

/// Frames plus caption in, embeddings out. Deterministic for identical input.
pub trait SegmentEncoder {
    fn encode(&mut self, frames: &[Frame], caption: &str) -> Result<Embedding, EncodeError>;
}

/// Builds per-worker decoder and encoder instances
pub trait EncoderFactory: Send + Sync {
    fn decoder(&self, ctx: &WorkerContext) -> Result<Box<dyn FrameDecoder>, EncodeError>;

    fn encoder(&self, ctx: &WorkerContext) -> Result<Box<dyn SegmentEncoder>, EncodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_fills_devices_in_order() {
        // Four workers at a quarter device each share device 0
        let devices: Vec<usize> = (0..4)
            .map(|id| WorkerContext::place(id, 0.25, 2).device)
            .collect();
        assert_eq!(devices, vec![0, 0, 0, 0]);

        // Half a device each spreads over two devices
        let devices: Vec<usize> = (0..4)
            .map(|id| WorkerContext::place(id, 0.5, 2).device)
            .collect();
        assert_eq!(devices, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_place_wraps_when_oversubscribed() {
        let ctx = WorkerContext::place(3, 1.0, 2);
        assert_eq!(ctx.device, 1);
        assert_eq!(ctx.accelerator_fraction, 1.0);
    }
}
