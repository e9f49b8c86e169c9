use ndarray::{ArrayD, IxDyn, ShapeError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Segment metadata stored for every record of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Full path of the source video
    pub video_filepath: String,

    /// Segment bounds in seconds
    pub segment_start: f64,
    pub segment_end: f64,

    /// Transcript text for the segment
    #[serde(default)]
    pub caption: String,
}

impl SegmentMeta {
    pub fn new(video_filepath: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            video_filepath: video_filepath.into(),
            segment_start: start,
            segment_end: end,
            caption: String::new(),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Timestamp the encoder samples for this segment
    pub fn midpoint(&self) -> f64 {
        (self.segment_start + self.segment_end) / 2.0
    }
}

/// Element type of an output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    F32,
    F64,
    U8,
}

impl ElementKind {
    /// Size of one element in bytes
    pub fn size(&self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
            Self::U8 => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::U8 => "u8",
        }
    }

    /// True when every little-endian element in `bytes` equals zero.
    pub fn all_zero(&self, bytes: &[u8]) -> bool {
        match self {
            Self::F32 => bytes
                .chunks_exact(4)
                .all(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) == 0.0),
            Self::F64 => bytes.chunks_exact(8).all(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                f64::from_le_bytes(b) == 0.0
            }),
            Self::U8 => bytes.iter().all(|b| *b == 0),
        }
    }
}

/// Typed n-dimensional value for one output column
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    U8(ArrayD<u8>),
}

impl Tensor {
    /// Zero-dimensional f64, used for the timestamp column
    pub fn scalar(value: f64) -> Self {
        Self::F64(ArrayD::from_elem(IxDyn(&[]), value))
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Self::F32(_) => ElementKind::F32,
            Self::F64(_) => ElementKind::F64,
            Self::U8(_) => ElementKind::U8,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::F32(a) => a.shape(),
            Self::F64(a) => a.shape(),
            Self::U8(a) => a.shape(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Self::F32(a) => a.iter().all(|v| *v == 0.0),
            Self::F64(a) => a.iter().all(|v| *v == 0.0),
            Self::U8(a) => a.iter().all(|v| *v == 0),
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::F64(a) if a.len() == 1 => a.iter().next().copied(),
            _ => None,
        }
    }

    /// Serializes elements in logical (row-major) order into `out`.
    ///
    /// `out` must be exactly `len * kind().size()` bytes.
    pub(crate) fn write_le(&self, out: &mut [u8]) {
        match self {
            Self::F32(a) => {
                for (dst, v) in out.chunks_exact_mut(4).zip(a.iter()) {
                    dst.copy_from_slice(&v.to_le_bytes());
                }
            }
            Self::F64(a) => {
                for (dst, v) in out.chunks_exact_mut(8).zip(a.iter()) {
                    dst.copy_from_slice(&v.to_le_bytes());
                }
            }
            Self::U8(a) => {
                for (dst, v) in out.iter_mut().zip(a.iter()) {
                    *dst = *v;
                }
            }
        }
    }

    pub(crate) fn from_le_bytes(
        kind: ElementKind,
        shape: &[usize],
        bytes: &[u8],
    ) -> Result<Self, ShapeError> {
        let dim = IxDyn(shape);
        let tensor = match kind {
            ElementKind::F32 => {
                let values = bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Self::F32(ArrayD::from_shape_vec(dim, values)?)
            }
            ElementKind::F64 => {
                let values = bytes
                    .chunks_exact(8)
                    .map(|c| {
                        let mut b = [0u8; 8];
                        b.copy_from_slice(c);
                        f64::from_le_bytes(b)
                    })
                    .collect();
                Self::F64(ArrayD::from_shape_vec(dim, values)?)
            }
            ElementKind::U8 => Self::U8(ArrayD::from_shape_vec(dim, bytes.to_vec())?),
        };
        Ok(tensor)
    }
}

/// Output values of one record, keyed by column name
pub type OutputFields = BTreeMap<String, Tensor>;
