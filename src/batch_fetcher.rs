use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::key::{Key, Namespace};

/// A `BatchFetcher` converts one batch of distinct keys into results, making
/// exactly one backend call per invocation. It is the sole point of contact
/// between the loader and a backend service.
///
/// The keys are distinct and arrive in the order they were first requested,
/// but no ordering may be assumed across calls. The returned sequence must be
/// positionally aligned with the input keys and of identical length; fetchers
/// that reorder or drop entries silently corrupt unrelated resolvers'
/// results, so a length mismatch rejects the whole batch as a
/// [`ContractViolation`](crate::ContractViolation).
///
/// The outer `Err` fails the whole batch (every waiting key receives it);
/// a per-key `Err` in the inner sequence is scoped to that key alone.
/// Authorization failures for a subset of keys should be reported per key,
/// not as a whole-batch failure, so permissible keys keep partial-success
/// semantics.
///
/// One fetcher instance is shared by every in-flight request, so it must not
/// hold request-scoped mutable state; everything request-scoped arrives
/// through `keys` and `auth`. The same `auth` value is passed to every
/// invocation within one request, and the loader never inspects it;
/// authorization policy lives entirely in the fetcher.
#[async_trait]
pub trait BatchFetcher<V, E, A>: Send + Sync {
    async fn fetch(&self, keys: &[Key], auth: &A) -> Result<Vec<Result<V, E>>, E>;
}

/// Immutable namespace → fetcher table, assembled once at process start and
/// shared by every request (typically behind an `Arc`).
///
/// All fetchers in one registry share the value type `V`, the error type `E`,
/// and the authorization context type `A`. Gateways with polymorphic output
/// use a tagged enum for `V` and dispatch on it in the resolver layer.
pub struct FetcherRegistry<V, E, A> {
    fetchers: HashMap<Namespace, Arc<dyn BatchFetcher<V, E, A>>>,
}

impl<V, E, A> FetcherRegistry<V, E, A> {
    pub fn builder() -> FetcherRegistryBuilder<V, E, A> {
        FetcherRegistryBuilder { fetchers: HashMap::new() }
    }

    pub(crate) fn get(&self, namespace: Namespace) -> Option<&Arc<dyn BatchFetcher<V, E, A>>> {
        self.fetchers.get(&namespace)
    }
}

/// Builder for a [`FetcherRegistry`].
pub struct FetcherRegistryBuilder<V, E, A> {
    fetchers: HashMap<Namespace, Arc<dyn BatchFetcher<V, E, A>>>,
}

impl<V, E, A> FetcherRegistryBuilder<V, E, A> {
    /// Registers `fetcher` as the owner of `namespace`.
    ///
    /// Registering the same namespace twice replaces the earlier fetcher and
    /// logs a warning; registries are assembled once at startup, so a
    /// duplicate is a configuration mistake worth surfacing.
    pub fn register<F>(mut self, namespace: Namespace, fetcher: F) -> Self
    where
        F: BatchFetcher<V, E, A> + 'static,
    {
        if self.fetchers.insert(namespace, Arc::new(fetcher)).is_some() {
            tracing::warn!(%namespace, "replacing previously registered fetcher");
        }
        self
    }

    pub fn build(self) -> FetcherRegistry<V, E, A> {
        FetcherRegistry { fetchers: self.fetchers }
    }
}

impl<V, E, A> Default for FetcherRegistryBuilder<V, E, A> {
    fn default() -> Self {
        FetcherRegistry::builder()
    }
}
