pub mod assembler;
pub mod coordinator;
pub mod queue;
pub mod state;
pub mod uploader;
pub mod worker;

pub use assembler::{Assembly, BatchAssembler};
pub use coordinator::{PoolCoordinator, RunSummary};
pub use state::PoolState;
pub use uploader::{FlushPolicy, UploadReport, Uploader};
pub use worker::{encode_batch, EncodeWorker, WorkerReport};
