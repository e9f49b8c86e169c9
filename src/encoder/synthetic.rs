use super::{Embedding, EncoderFactory, Frame, FrameDecoder, SegmentEncoder, WorkerContext};
use crate::dataset::OutputShape;
use crate::error::EncodeError;
use ndarray::{Array1, Array2, Array3};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a64(seed: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(seed, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Deterministic stand-in decoder: frame pixels derive from source and timestamp
pub struct SyntheticDecoder {
    height: usize,
    width: usize,
}

impl SyntheticDecoder {
    pub fn new(shape: &OutputShape) -> Self {
        Self {
            height: shape.frame_height,
            width: shape.frame_width,
        }
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn decode(&mut self, source: &str, timestamps: &[f64]) -> Result<Vec<Frame>, EncodeError> {
        if source.is_empty() {
            return Err(EncodeError::Decode {
                source_file: source.to_string(),
                message: "empty source path".to_string(),
            });
        }

        let base = fnv1a64(FNV_OFFSET, source.as_bytes());
        timestamps
            .iter()
            .map(|t| {
                if !t.is_finite() || *t < 0.0 {
                    return Err(EncodeError::Decode {
                        source_file: source.to_string(),
                        message: format!("invalid timestamp {}", t),
                    });
                }
                let seed = fnv1a64(base, &t.to_le_bytes()).to_le_bytes();
                Ok(Array3::from_shape_fn((self.height, self.width, 3), |(y, x, c)| {
                    seed[(y + x + c) % 8].wrapping_add((y * 31 + x * 7 + c) as u8)
                }))
            })
            .collect()
    }
}

/// Deterministic stand-in encoder. Outputs are never all zero.
pub struct SyntheticEncoder {
    shape: OutputShape,
}

impl SyntheticEncoder {
    pub fn new(shape: &OutputShape) -> Self {
        Self { shape: *shape }
    }
}

impl SegmentEncoder for SyntheticEncoder {
    fn encode(&mut self, frames: &[Frame], caption: &str) -> Result<Embedding, EncodeError> {
        if frames.is_empty() {
            return Err(EncodeError::Model("no frames to encode".to_string()));
        }

        let mut seed = fnv1a64(FNV_OFFSET, caption.as_bytes());
        for frame in frames {
            for px in frame.iter().step_by(97) {
                seed = fnv1a64(seed, &[*px]);
            }
        }

        let value = |i: usize| {
            let h = fnv1a64(seed, &(i as u64).to_le_bytes());
            (h & 0xffff) as f32 / 65_536.0 + 1e-3
        };

        let dim = self.shape.embedding_dim;
        let pooled = Array1::from_shape_fn(dim, |i| value(i));
        let hidden_states =
            Array2::from_shape_fn((self.shape.hidden_len, dim), |(s, d)| value(s * dim + d));

        Ok(Embedding {
            pooled,
            hidden_states,
        })
    }
}

/// Factory for the synthetic decoder and encoder
pub struct SyntheticFactory {
    shape: OutputShape,
}

impl SyntheticFactory {
    pub fn new(shape: OutputShape) -> Self {
        Self { shape }
    }
}

impl EncoderFactory for SyntheticFactory {
    fn decoder(&self, _ctx: &WorkerContext) -> Result<Box<dyn FrameDecoder>, EncodeError> {
        Ok(Box::new(SyntheticDecoder::new(&self.shape)))
    }

    fn encoder(&self, _ctx: &WorkerContext) -> Result<Box<dyn SegmentEncoder>, EncodeError> {
        Ok(Box::new(SyntheticEncoder::new(&self.shape)))
    }
}
