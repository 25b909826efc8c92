use std::fmt::Debug;
use std::sync::Arc;

use futures::future::{self, FutureExt};
use tokio::sync::mpsc;

use crate::batch_fetcher::FetcherRegistry;
use crate::cache::{send_reply, RequestCache};
use crate::config::LoaderConfig;
use crate::dispatcher::{Batch, Dispatcher};
use crate::error::{ContractViolation, LoadError};
use crate::key::Key;
use crate::loader_op::{LoaderOp, ReplyTx};
#[cfg(feature = "stats")]
use crate::worker_stats::WorkerStats;

/// A `LoaderWorker` is the "single-thread" worker task that owns one
/// request's cache and batch state.
///
/// Once started, it runs in a loop until the parent Loader aborts its
/// `JoinHandle` or drops the op queue tx channel. All mutable state lives in
/// the worker, so loads arriving concurrently from any number of resolver
/// tasks serialize through the op queue and never need a lock.
///
/// The worker cycles through three states:
///
/// 1. Waiting for operations.
/// 2. Draining the op queue: primes and clears apply to the cache
///    immediately; loads are answered from the cache where possible and
///    otherwise staged with the dispatcher.
/// 3. Flushing: every staged batch is fetched (batches for different
///    namespaces run concurrently) and the results settle their slots.
///
/// One cycle through this loop is the batching window, or "tick". Draining
/// pulls operations only as long as they are synchronously available
/// (`now_or_never`), which corresponds to "the execution engine has
/// exhausted every resolver that can run without awaiting": flushing
/// earlier would regress toward one backend call per field, flushing later
/// would stall the request. [`LoaderConfig::delay`] optionally holds the
/// window open once more before the flush.
pub struct LoaderWorker<V, E, A>
where
    V: 'static + Clone + Debug + Send,
    E: 'static + Clone + Debug + Send,
    A: 'static + Send + Sync,
{
    registry: Arc<FetcherRegistry<V, E, A>>,
    auth: A,
    config: LoaderConfig,
    cache: RequestCache<V, E>,
    dispatcher: Dispatcher<V, E, A>,
    op_rx: mpsc::UnboundedReceiver<LoaderOp<V, E>>,
    #[cfg(feature = "stats")]
    stats: WorkerStats,
}

impl<V, E, A> LoaderWorker<V, E, A>
where
    V: 'static + Clone + Debug + Send,
    E: 'static + Clone + Debug + Send,
    A: 'static + Send + Sync,
{
    pub fn new(
        registry: Arc<FetcherRegistry<V, E, A>>,
        auth: A,
        config: LoaderConfig,
        op_rx: mpsc::UnboundedReceiver<LoaderOp<V, E>>,
    ) -> Self {
        Self {
            registry,
            auth,
            config,
            cache: RequestCache::new(),
            dispatcher: Dispatcher::new(),
            op_rx,
            #[cfg(feature = "stats")]
            stats: WorkerStats::new(),
        }
    }

    pub async fn run(mut self) {
        loop {
            // Async await until we receive the first op of the tick.
            match self.op_rx.recv().await {
                None => {
                    tracing::debug!("op channel closed, terminating loader worker");
                    self.cache.cancel_pending();
                    return;
                }
                Some(op) => self.mux_op(op),
            }
            // Drain the rest of the synchronously available ops.
            while let Some(Some(op)) = self.op_rx.recv().now_or_never() {
                self.mux_op(op);
            }
            if self.dispatcher.has_staged() {
                if let Some(delay) = self.config.delay {
                    // Hold the window open once so resolver tasks scheduled
                    // on other runtime threads can still join this tick.
                    tokio::time::sleep(delay).await;
                    while let Some(Some(op)) = self.op_rx.recv().now_or_never() {
                        self.mux_op(op);
                    }
                }
                self.flush().await;
            }
        }
    }

    #[tracing::instrument(skip(self, op))]
    fn mux_op(&mut self, op: LoaderOp<V, E>) {
        match op {
            LoaderOp::Load(request) => request.for_each(|key, reply| self.handle_load(key, reply)),
            LoaderOp::Prime(key, value) => self.handle_prime(key, value),
            LoaderOp::PrimeMany(pairs) => {
                for (key, value) in pairs {
                    self.handle_prime(key, value);
                }
            }
            LoaderOp::Clear(key) => self.cache.clear(&key),
            LoaderOp::ClearMany(keys) => {
                for key in &keys {
                    self.cache.clear(key);
                }
            }
            LoaderOp::ClearAll => self.cache.clear_all(),
        }
    }

    fn handle_load(&mut self, key: Key, reply: ReplyTx<V, E>) {
        #[cfg(feature = "stats")]
        self.stats.record_key_requested();
        let Some(reply) = self.cache.try_answer(&key, reply) else {
            #[cfg(feature = "stats")]
            self.stats.record_cache_hit();
            return;
        };
        // The entry may have been cleared while the key is still staged; the
        // staged fetch has not been dispatched yet, so rejoin it instead of
        // putting the key into the batch a second time.
        if let Some(slot) = self.dispatcher.staged_slot(&key) {
            self.cache.rejoin_slot(key, slot, reply);
            return;
        }
        let Some(fetcher) = self.registry.get(key.namespace()) else {
            tracing::warn!(%key, "load for a namespace with no registered fetcher");
            send_reply(reply, Err(LoadError::UnknownNamespace(key.namespace())));
            return;
        };
        let fetcher = Arc::clone(fetcher);
        tracing::debug!(%key, "staging key for next flush");
        let slot = self.cache.open_slot(key.clone(), reply);
        self.dispatcher.stage(&fetcher, key, slot);
    }

    fn handle_prime(&mut self, key: Key, value: V) {
        if !self.cache.prime(key.clone(), value) {
            tracing::debug!(%key, "prime skipped, key already has an entry");
        }
    }

    #[tracing::instrument(skip(self))]
    async fn flush(&mut self) {
        let batches = self.dispatcher.take_batches(self.config.max_batch_size);
        #[cfg(feature = "stats")]
        {
            self.stats.record_flush();
            for batch in &batches {
                self.stats.record_fetch_call(batch.keys.len() as u32);
            }
        }
        let auth = &self.auth;
        let outcomes = future::join_all(batches.into_iter().map(|batch| async move {
            tracing::debug!(namespace = %batch.namespace, keys = batch.keys.len(), "dispatching batch");
            let outcome = batch.fetcher.fetch(&batch.keys, auth).await;
            (batch, outcome)
        }))
        .await;
        for (batch, outcome) in outcomes {
            self.settle_batch(batch, outcome);
        }
    }

    fn settle_batch(&mut self, batch: Batch<V, E, A>, outcome: Result<Vec<Result<V, E>>, E>) {
        let Batch { namespace, keys, slots, .. } = batch;
        match outcome {
            Err(error) => {
                // Nothing attributes the failure to a subset of the keys.
                tracing::debug!(%namespace, ?error, "batch fetch failed");
                for (key, slot) in keys.iter().zip(slots) {
                    self.cache.settle(key, slot, Err(LoadError::Batch(error.clone())));
                }
            }
            Ok(results) if results.len() != keys.len() => {
                let violation = ContractViolation {
                    namespace,
                    expected: keys.len(),
                    actual: results.len(),
                };
                tracing::error!(%violation, "fetcher broke the batch alignment contract");
                for (key, slot) in keys.iter().zip(slots) {
                    self.cache.settle(key, slot, Err(LoadError::Contract(violation.clone())));
                }
            }
            Ok(results) => {
                for ((key, slot), result) in keys.iter().zip(slots).zip(results) {
                    self.cache.settle(key, slot, result.map_err(LoadError::Fetch));
                }
            }
        }
    }
}
