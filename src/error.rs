use thiserror::Error;

use crate::key::Namespace;

/// Result of a single load, as delivered to the awaiting resolver.
pub type LoadResult<V, E> = Result<V, LoadError<E>>;

/// Why a load did not produce a value.
///
/// `E` is the error type shared by every fetcher in the registry; the
/// variants distinguish how far the failure reaches. [`Fetch`] is scoped to
/// one key, [`Batch`] and [`Contract`] to every key of one batch, and none
/// of them ever crosses into unrelated batches or requests.
///
/// [`Fetch`]: LoadError::Fetch
/// [`Batch`]: LoadError::Batch
/// [`Contract`]: LoadError::Contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError<E> {
    /// The fetcher reported an error for this key; other keys in the same
    /// batch settle independently.
    #[error("fetch failed: {0}")]
    Fetch(E),

    /// The fetch invocation itself failed, so nothing attributes the failure
    /// to a subset of keys; every key in the batch receives this error.
    #[error("batch fetch failed: {0}")]
    Batch(E),

    /// The fetcher returned a result sequence that does not line up with the
    /// keys it was given.
    #[error(transparent)]
    Contract(ContractViolation),

    /// The request was aborted before the key settled.
    #[error("request cancelled before the key settled")]
    Cancelled,

    /// The key names a namespace with no registered fetcher.
    #[error("no fetcher registered for namespace `{0}`")]
    UnknownNamespace(Namespace),
}

/// A fetcher broke the batch alignment contract: results must be positionally
/// aligned with the input keys and of identical length.
///
/// This is a programming error in the fetcher, not a data error. Positional
/// alignment is the only thing tying results back to keys, so a mismatched
/// sequence cannot be attributed and the whole batch is rejected loudly
/// rather than risking misattributed values in unrelated resolvers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetcher for `{namespace}` returned {actual} results for {expected} keys")]
pub struct ContractViolation {
    pub namespace: Namespace,
    pub expected: usize,
    pub actual: usize,
}
