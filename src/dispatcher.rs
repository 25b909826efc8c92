use std::collections::HashMap;
use std::mem;
use std::num::NonZeroUsize;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::batch_fetcher::BatchFetcher;
use crate::cache::SlotId;
use crate::key::{Key, Namespace};

/// One namespace's staged keys for the current tick.
struct Staged<V, E, A> {
    fetcher: Arc<dyn BatchFetcher<V, E, A>>,
    keys: IndexMap<Key, SlotId>,
}

/// A flush-ready batch: distinct keys in arrival order, positionally paired
/// with the slots their results settle.
pub struct Batch<V, E, A> {
    pub namespace: Namespace,
    pub fetcher: Arc<dyn BatchFetcher<V, E, A>>,
    pub keys: Vec<Key>,
    pub slots: Vec<SlotId>,
}

/// Accumulates the keys requested during one tick, one batch per fetcher.
///
/// Staging is keyed by namespace; within a namespace the batch is an
/// insertion-ordered map, so keys stay distinct and the fetcher sees them in
/// first-request order. The whole staging area is taken at flush time and
/// the next tick starts empty.
pub struct Dispatcher<V, E, A> {
    staged: HashMap<Namespace, Staged<V, E, A>>,
}

impl<V, E, A> Dispatcher<V, E, A> {
    pub fn new() -> Self {
        Self { staged: HashMap::new() }
    }

    /// Slot currently staged for `key`, if its namespace has an open batch
    /// containing it. Used to re-join a fetch after the cache entry was
    /// cleared.
    pub fn staged_slot(&self, key: &Key) -> Option<SlotId> {
        self.staged.get(&key.namespace()).and_then(|staged| staged.keys.get(key).copied())
    }

    /// Appends `key` to the current tick's batch for its namespace.
    pub fn stage(&mut self, fetcher: &Arc<dyn BatchFetcher<V, E, A>>, key: Key, slot: SlotId) {
        let staged = self
            .staged
            .entry(key.namespace())
            .or_insert_with(|| Staged { fetcher: Arc::clone(fetcher), keys: IndexMap::new() });
        let previous = staged.keys.insert(key, slot);
        debug_assert!(previous.is_none(), "key staged twice in one batch");
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Takes every staged batch for this flush, splitting any batch larger
    /// than `max_batch_size` into consecutive chunks.
    pub fn take_batches(&mut self, max_batch_size: Option<NonZeroUsize>) -> Vec<Batch<V, E, A>> {
        let cap = max_batch_size.map_or(usize::MAX, NonZeroUsize::get);
        let mut batches = Vec::new();
        for (namespace, staged) in self.staged.drain() {
            let Staged { fetcher, keys } = staged;
            let mut chunk_keys = Vec::new();
            let mut chunk_slots = Vec::new();
            for (key, slot) in keys {
                chunk_keys.push(key);
                chunk_slots.push(slot);
                if chunk_keys.len() >= cap {
                    batches.push(Batch {
                        namespace,
                        fetcher: Arc::clone(&fetcher),
                        keys: mem::take(&mut chunk_keys),
                        slots: mem::take(&mut chunk_slots),
                    });
                }
            }
            if !chunk_keys.is_empty() {
                batches.push(Batch { namespace, fetcher, keys: chunk_keys, slots: chunk_slots });
            }
        }
        batches
    }
}

impl<V, E, A> Default for Dispatcher<V, E, A> {
    fn default() -> Self {
        Self::new()
    }
}
