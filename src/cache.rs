use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;

use crate::error::{LoadError, LoadResult};
use crate::key::Key;
use crate::loader_op::ReplyTx;

/// Identifies one pending fetch slot within a request.
///
/// A slot is opened the first time a key misses the cache, collects every
/// waiter that joins before settlement, and is consumed when its batch
/// settles. Slot ids are never reused within a request, which is what keeps
/// a settling batch from overwriting an entry that was cleared and re-fetched
/// in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

#[derive(Debug)]
enum Entry<V, E> {
    /// A fetch for this key is staged or in flight; waiters are parked on
    /// the slot.
    Pending(SlotId),
    /// The key settled; later loads answer immediately with a clone.
    Settled(LoadResult<V, E>),
}

/// Per-request map from [`Key`] to a pending-or-settled result.
///
/// Holds at most one entry per distinct key, so each key is fetched at most
/// once within the request unless it is explicitly cleared. Pending entries
/// point at a slot carrying the reply channels of every caller awaiting that
/// key; settled entries store the result and answer later loads directly.
///
/// The cache is owned by a single [`LoaderWorker`] task, created when the
/// request starts and dropped when it completes, so none of this needs
/// locking.
///
/// [`LoaderWorker`]: crate::loader_worker::LoaderWorker
#[derive(Debug)]
pub struct RequestCache<V, E> {
    entries: HashMap<Key, Entry<V, E>>,
    waiters: HashMap<SlotId, Vec<ReplyTx<V, E>>>,
    next_slot: u64,
}

impl<V, E> RequestCache<V, E>
where
    V: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self { entries: HashMap::new(), waiters: HashMap::new(), next_slot: 0 }
    }

    /// Attempts to answer `reply` from the cache. Returns the reply channel
    /// back to the caller when the key has no entry, so a fetch can be
    /// staged for it.
    pub fn try_answer(&mut self, key: &Key, reply: ReplyTx<V, E>) -> Option<ReplyTx<V, E>> {
        let slot = match self.entries.get(key) {
            Some(Entry::Settled(result)) => {
                send_reply(reply, result.clone());
                return None;
            }
            Some(Entry::Pending(slot)) => *slot,
            None => return Some(reply),
        };
        self.waiters.entry(slot).or_default().push(reply);
        None
    }

    /// Opens a pending slot for `key`, seeded with its first waiter.
    pub fn open_slot(&mut self, key: Key, reply: ReplyTx<V, E>) -> SlotId {
        let slot = SlotId(self.next_slot);
        self.next_slot += 1;
        self.waiters.insert(slot, vec![reply]);
        self.entries.insert(key, Entry::Pending(slot));
        slot
    }

    /// Re-attaches `key` to a slot that is still staged after the entry was
    /// cleared, so the key joins the fetch it is already part of instead of
    /// entering the batch twice.
    pub fn rejoin_slot(&mut self, key: Key, slot: SlotId, reply: ReplyTx<V, E>) {
        self.waiters.entry(slot).or_default().push(reply);
        self.entries.insert(key, Entry::Pending(slot));
    }

    /// Seeds `key` with an already-resolved value. Returns false without
    /// touching the cache when any entry exists, pending or settled.
    pub fn prime(&mut self, key: Key, value: V) -> bool {
        match self.entries.entry(key) {
            MapEntry::Occupied(_) => false,
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::Settled(Ok(value)));
                true
            }
        }
    }

    /// Evicts `key` so the next load refetches it. Waiters already attached
    /// to a pending entry keep the fetch they joined; only the cache entry
    /// goes away.
    pub fn clear(&mut self, key: &Key) {
        self.entries.remove(key);
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    /// Settles `slot` with `result`, waking its waiters, and stores the
    /// result under `key` unless the entry was cleared or re-seeded while
    /// the fetch was out.
    pub fn settle(&mut self, key: &Key, slot: SlotId, result: LoadResult<V, E>) {
        if let Some(waiters) = self.waiters.remove(&slot) {
            for reply in waiters {
                send_reply(reply, result.clone());
            }
        }
        if let Some(entry) = self.entries.get_mut(key) {
            if matches!(entry, Entry::Pending(pending) if *pending == slot) {
                *entry = Entry::Settled(result);
            }
        }
    }

    /// Settles every pending slot with [`LoadError::Cancelled`] and drops
    /// all entries. Used when the request scope winds down with loads still
    /// outstanding.
    pub fn cancel_pending(&mut self) {
        for (_slot, waiters) in self.waiters.drain() {
            for reply in waiters {
                send_reply(reply, Err(LoadError::Cancelled));
            }
        }
        self.entries.clear();
    }
}

/// Delivers `result` on `reply`, tolerating callers that lost interest.
pub fn send_reply<V, E>(reply: ReplyTx<V, E>, result: LoadResult<V, E>) {
    if reply.send(result).is_err() {
        tracing::debug!("receiver dropped before its key settled");
    }
}
