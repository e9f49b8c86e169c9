pub mod batch;
pub mod record;

pub use batch::{Batch, BatchEntry, EncodedBatch, EncodedRecord};
pub use record::{ElementKind, OutputFields, SegmentMeta, Tensor};
