use tokio::sync::oneshot;

use crate::error::LoadResult;
use crate::key::Key;

/// Reply channel handed back to a caller for one requested key.
pub type ReplyTx<V, E> = oneshot::Sender<LoadResult<V, E>>;

/// Set of possible requests that can be sent to the [`LoaderWorker`].
///
/// The three categories of commands are Load, Prime, and Clear; each of which
/// has a single and many variant for convenience.
///
/// [`LoaderWorker`]: crate::loader_worker::LoaderWorker
#[derive(Debug)]
pub enum LoaderOp<V, E> {
    /// Fetch data for one or more keys, joining pending or settled cache
    /// entries where they exist.
    Load(LoadRequest<V, E>),
    /// Add values to the cache that were fetched from elsewhere. Per key, a
    /// strict no-op when any entry already exists.
    Prime(Key, V),
    PrimeMany(Vec<(Key, V)>),
    /// Remove values from the cache so that they will be reloaded when they
    /// are next requested.
    Clear(Key),
    ClearMany(Vec<Key>),
    ClearAll,
}

/// A load request with the reply channel for each requested key.
#[derive(Debug)]
pub enum LoadRequest<V, E> {
    One(Key, ReplyTx<V, E>),
    Many(Vec<(Key, ReplyTx<V, E>)>),
}

impl<V, E> LoadRequest<V, E> {
    /// Feeds every `(key, reply)` pair of this request to `handle`, in
    /// request order.
    pub fn for_each(self, mut handle: impl FnMut(Key, ReplyTx<V, E>)) {
        match self {
            LoadRequest::One(key, reply) => handle(key, reply),
            LoadRequest::Many(entries) => {
                for (key, reply) in entries {
                    handle(key, reply);
                }
            }
        }
    }
}
