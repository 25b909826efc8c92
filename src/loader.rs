use std::fmt::Debug;
use std::ops::Drop;
use std::sync::Arc;

use futures::future;
use tokio::sync::{mpsc, oneshot};
use tracing::{span, Level};
use tracing_futures::Instrument;

use crate::{
    batch_fetcher::FetcherRegistry,
    config::LoaderConfig,
    error::{LoadError, LoadResult},
    key::Key,
    loader_op::{LoadRequest, LoaderOp},
    loader_worker::LoaderWorker,
};

/// Batch loads values from backend services, scoped to one client request.
///
/// A `Loader` is created at the start of a GraphQL operation's execution and
/// dropped when the operation completes. Resolvers call [`Loader::load`] and
/// [`Loader::load_many`]; every distinct [`Key`] requested within the request
/// is fetched at most once, and keys requested within the same execution tick
/// are handed to their namespace's fetcher as a single batch. Mutation
/// handlers use [`Loader::clear`] and [`Loader::prime`] to invalidate or seed
/// cache entries after a write.
///
/// The `Loader` acts as an intermediary between the async domain in which
/// `load` calls are invoked and the pseudo-single-threaded domain of the
/// `LoaderWorker`. Callers can invoke the `Loader` from multiple parallel
/// resolver tasks; operations are enqueued on the op queue and processed
/// sequentially by the worker, with results returned over oneshot channels.
///
/// Dropping the `Loader` (or calling [`Loader::cancel`]) aborts the worker:
/// pending loads settle as [`LoadError::Cancelled`] and results of fetches
/// still in flight are discarded.
pub struct Loader<V, E>
where
    V: 'static + Clone + Debug + Send,
    E: 'static + Clone + Debug + Send,
{
    op_tx: mpsc::UnboundedSender<LoaderOp<V, E>>,
    worker_handle: tokio::task::JoinHandle<()>,
}

impl<V, E> Drop for Loader<V, E>
where
    V: 'static + Clone + Debug + Send,
    E: 'static + Clone + Debug + Send,
{
    fn drop(&mut self) {
        self.worker_handle.abort();
    }
}

impl<V, E> Loader<V, E>
where
    V: 'static + Clone + Debug + Send,
    E: 'static + Clone + Debug + Send,
{
    /// Creates a loader for one request.
    ///
    /// The registry is the process-wide namespace → fetcher table; `auth` is
    /// the request's authorization context, passed unchanged into every fetch
    /// invocation the loader makes on behalf of this request.
    pub fn new<A>(registry: Arc<FetcherRegistry<V, E, A>>, auth: A) -> Self
    where
        A: 'static + Send + Sync,
    {
        Self::with_config(registry, auth, LoaderConfig::default())
    }

    /// Creates a loader with explicit batching knobs, see [`LoaderConfig`].
    pub fn with_config<A>(
        registry: Arc<FetcherRegistry<V, E, A>>,
        auth: A,
        config: LoaderConfig,
    ) -> Self
    where
        A: 'static + Send + Sync,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = LoaderWorker::new(registry, auth, config, rx);
        let span = span!(Level::TRACE, "loader_worker");
        Self { op_tx: tx, worker_handle: tokio::task::spawn(worker.run().instrument(span)) }
    }

    /// Loads the value for `key`.
    ///
    /// If the key already has a settled cache entry, a clone of the stored
    /// result is returned as soon as the worker processes the request. If a
    /// fetch for the key is already pending, this call joins it. Otherwise
    /// the key is staged for batch loading in the next flush.
    pub async fn load(&self, key: Key) -> LoadResult<V, E> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.op_tx.send(LoaderOp::Load(LoadRequest::One(key, reply_tx))).is_err() {
            return Err(LoadError::Cancelled);
        }
        reply_rx.await.unwrap_or(Err(LoadError::Cancelled))
    }

    /// Loads many keys at once; the result order matches the input order.
    ///
    /// Keys may repeat within the call and may belong to different
    /// namespaces; each entry resolves exactly as an individual [`Loader::load`]
    /// would.
    pub async fn load_many(&self, keys: Vec<Key>) -> Vec<LoadResult<V, E>> {
        let mut entries = Vec::with_capacity(keys.len());
        let mut replies = Vec::with_capacity(keys.len());
        for key in keys {
            let (reply_tx, reply_rx) = oneshot::channel();
            entries.push((key, reply_tx));
            replies.push(reply_rx);
        }
        if self.op_tx.send(LoaderOp::Load(LoadRequest::Many(entries))).is_err() {
            return replies.into_iter().map(|_| Err(LoadError::Cancelled)).collect();
        }
        future::join_all(replies)
            .await
            .into_iter()
            .map(|reply| reply.unwrap_or(Err(LoadError::Cancelled)))
            .collect()
    }

    /// Seeds the cache with a value fetched out-of-band.
    ///
    /// A strict no-op when the key already has an entry, pending or settled:
    /// callers who already asked for the key keep the result they are
    /// waiting on.
    pub fn prime(&self, key: Key, value: V) {
        let _ = self.op_tx.send(LoaderOp::Prime(key, value));
    }

    /// Seeds many values at once.
    pub fn prime_many(&self, pairs: Vec<(Key, V)>) {
        let _ = self.op_tx.send(LoaderOp::PrimeMany(pairs));
    }

    /// Evicts a key from the cache.
    ///
    /// The key will be refetched when it is next requested. Callers already
    /// awaiting the key still receive the result of the fetch they joined.
    pub fn clear(&self, key: Key) {
        let _ = self.op_tx.send(LoaderOp::Clear(key));
    }

    /// Evicts multiple keys at once.
    pub fn clear_many(&self, keys: Vec<Key>) {
        let _ = self.op_tx.send(LoaderOp::ClearMany(keys));
    }

    /// Evicts every cache entry.
    pub fn clear_all(&self) {
        let _ = self.op_tx.send(LoaderOp::ClearAll);
    }

    /// Aborts the request scope.
    ///
    /// Every pending load settles as [`LoadError::Cancelled`], fetches still
    /// in flight are dropped and their results discarded, and all later
    /// operations on this loader are inert. Dropping the loader has the same
    /// effect.
    pub fn cancel(&self) {
        self.worker_handle.abort();
    }
}
