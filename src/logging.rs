use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `CLIPQUEUE_LOG` first, then `RUST_LOG`, then `info`.
///
/// Log fields used across the pool:
/// - `worker_id` on every worker event.
/// - `batch_id` on every per-batch event, plus `sources` and `timestamps` on failures.
/// - `record_index` when a single record is concerned.
pub fn init_tracing() {
    let filter = env_filter();
    // A second init (tests, embedding binaries) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("CLIPQUEUE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
