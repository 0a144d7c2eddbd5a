/// Batch size for sending records through the channel.
/// Larger batches reduce channel overhead but increase latency.
pub const BATCH_SIZE: usize = 64;

/// How long an idle worker waits on the queue before re-checking for completion.
pub const IDLE_POLL_MS: u64 = 50;
