use std::num::NonZeroUsize;
use std::time::Duration;

/// Tuning knobs for a request's batching behavior.
///
/// The default flushes as soon as the request's operation queue drains, so
/// every load that could be issued without awaiting further I/O lands in the
/// same batch. No cap is placed on batch size, so each fetcher is invoked at
/// most once per flush.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderConfig {
    pub delay: Option<Duration>,
    pub max_batch_size: Option<NonZeroUsize>,
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds the batching window open for `delay` after the queue first
    /// drains, admitting keys from resolver tasks scheduled on other worker
    /// threads. Useful on multi-threaded runtimes where the loader worker
    /// can otherwise flush between two concurrently executing resolvers.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Caps the number of keys handed to a single fetch call. A staged batch
    /// larger than the cap is split into consecutive calls within the same
    /// flush. A cap of zero disables the limit.
    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = NonZeroUsize::new(max);
        self
    }
}
