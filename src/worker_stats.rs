/// Counters for one request's loader worker.
///
/// Collected while the worker runs and reported in a single `debug` event
/// when the worker winds down, so a request's batching behavior (hit rate,
/// batch sizes, flush count) can be read off one log line.
#[derive(Debug)]
pub struct WorkerStats {
    /// Total number of keys requested across all load operations (not
    /// necessarily unique).
    keys_requested: u32,
    /// Keys answered from the cache or by joining an already-pending fetch.
    cache_hits: u32,
    /// Number of flushes that dispatched at least one batch.
    flushes: u32,
    /// Number of fetch calls issued across all flushes.
    fetch_calls: u32,
    /// The average number of distinct keys per fetch call.
    average_batch_size: f32,
    /// The most distinct keys handed to a single fetch call.
    max_batch_size: u32,
    /// The fewest distinct keys handed to a single fetch call.
    min_batch_size: u32,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self {
            keys_requested: 0,
            cache_hits: 0,
            flushes: 0,
            fetch_calls: 0,
            average_batch_size: 0.0,
            max_batch_size: 0,
            min_batch_size: u32::MAX,
        }
    }

    pub fn record_key_requested(&mut self) {
        self.keys_requested += 1;
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_flush(&mut self) {
        self.flushes += 1;
    }

    pub fn record_fetch_call(&mut self, batch_size: u32) {
        let new_total = self.fetch_calls + 1;
        self.average_batch_size = (((self.average_batch_size as f64 * self.fetch_calls as f64)
            + batch_size as f64)
            / new_total as f64) as f32;
        self.fetch_calls = new_total;
        if batch_size > self.max_batch_size {
            self.max_batch_size = batch_size;
        }
        if batch_size < self.min_batch_size {
            self.min_batch_size = batch_size;
        }
    }
}

impl Drop for WorkerStats {
    fn drop(&mut self) {
        tracing::debug!(worker_stats = ?self);
    }
}
