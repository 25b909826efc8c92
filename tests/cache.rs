use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future;
use gateload::{BatchFetcher, FetcherRegistry, Key, Loader, Namespace};

const COUNTERS: Namespace = Namespace::new("counters");

/// Returns a value that changes on every invocation, so tests can tell a
/// cached answer from a refetch, and counts its calls.
struct VersionedFetcher {
    version: AtomicI64,
    calls: Arc<Mutex<Vec<Vec<Key>>>>,
}

#[async_trait]
impl BatchFetcher<String, String, ()> for VersionedFetcher {
    async fn fetch(&self, keys: &[Key], _auth: &()) -> Result<Vec<Result<String, String>>, String> {
        self.calls.lock().unwrap().push(keys.to_vec());
        let version = self.version.fetch_add(1, Ordering::SeqCst);
        Ok(keys.iter().map(|key| Ok(format!("{key}@v{version}"))).collect())
    }
}

fn versioned_registry() -> (Arc<FetcherRegistry<String, String, ()>>, Arc<Mutex<Vec<Vec<Key>>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let fetcher = VersionedFetcher { version: AtomicI64::new(0), calls: Arc::clone(&calls) };
    let registry = Arc::new(FetcherRegistry::builder().register(COUNTERS, fetcher).build());
    (registry, calls)
}

#[tokio::test]
async fn prime_seeds_the_cache_and_suppresses_the_fetch() {
    let (registry, calls) = versioned_registry();
    let loader = Loader::new(registry, ());

    let key = Key::int(COUNTERS, 1);
    loader.prime(key.clone(), "seeded".to_owned());
    assert_eq!(loader.load(key).await, Ok("seeded".to_owned()));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn prime_after_load_is_a_no_op() {
    let (registry, calls) = versioned_registry();
    let loader = Loader::new(registry, ());

    let key = Key::int(COUNTERS, 1);
    assert_eq!(loader.load(key.clone()).await, Ok("counters/1@v0".to_owned()));
    loader.prime(key.clone(), "seeded".to_owned());
    assert_eq!(loader.load(key).await, Ok("counters/1@v0".to_owned()));
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn prime_many_seeds_only_missing_entries() {
    let (registry, calls) = versioned_registry();
    let loader = Loader::new(registry, ());

    let loaded = Key::int(COUNTERS, 1);
    let fresh = Key::int(COUNTERS, 2);
    assert_eq!(loader.load(loaded.clone()).await, Ok("counters/1@v0".to_owned()));

    loader.prime_many(vec![
        (loaded.clone(), "seeded one".to_owned()),
        (fresh.clone(), "seeded two".to_owned()),
    ]);

    assert_eq!(loader.load(loaded).await, Ok("counters/1@v0".to_owned()));
    assert_eq!(loader.load(fresh).await, Ok("seeded two".to_owned()));
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn clear_forces_a_refetch() {
    let (registry, calls) = versioned_registry();
    let loader = Loader::new(registry, ());

    let key = Key::int(COUNTERS, 1);
    assert_eq!(loader.load(key.clone()).await, Ok("counters/1@v0".to_owned()));
    loader.clear(key.clone());
    assert_eq!(loader.load(key).await, Ok("counters/1@v1".to_owned()));
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn clear_all_evicts_every_entry() {
    let (registry, calls) = versioned_registry();
    let loader = Loader::new(registry, ());

    let one = Key::int(COUNTERS, 1);
    let two = Key::int(COUNTERS, 2);
    loader.load_many(vec![one.clone(), two.clone()]).await;
    loader.clear_all();

    assert_eq!(loader.load(one).await, Ok("counters/1@v1".to_owned()));
    assert_eq!(loader.load(two).await, Ok("counters/2@v2".to_owned()));
    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn clear_many_evicts_only_the_named_keys() {
    let (registry, calls) = versioned_registry();
    let loader = Loader::new(registry, ());

    let one = Key::int(COUNTERS, 1);
    let two = Key::int(COUNTERS, 2);
    let three = Key::int(COUNTERS, 3);
    loader.load_many(vec![one.clone(), two.clone(), three.clone()]).await;
    loader.clear_many(vec![one.clone(), two.clone()]);

    assert_eq!(loader.load(three).await, Ok("counters/3@v0".to_owned()));
    assert_eq!(loader.load(one).await, Ok("counters/1@v1".to_owned()));
    assert_eq!(loader.load(two).await, Ok("counters/2@v2".to_owned()));
    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn clear_of_a_staged_key_keeps_waiters_on_one_fetch() {
    let (registry, calls) = versioned_registry();
    let loader = Loader::new(registry, ());
    let key = Key::int(COUNTERS, 1);

    // join3 polls in order, so the ops reach the worker as load, clear,
    // load within one tick. The second load arrives after the eviction but
    // before the staged fetch dispatches, so it rejoins that fetch instead
    // of staging the key twice.
    let (first, _, second) = future::join3(
        loader.load(key.clone()),
        async { loader.clear(key.clone()) },
        loader.load(key.clone()),
    )
    .await;

    assert_eq!(first, Ok("counters/1@v0".to_owned()));
    assert_eq!(second, Ok("counters/1@v0".to_owned()));
    {
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![key.clone()]);
    }

    // The rejoined fetch's result is cached; only a further clear refetches.
    assert_eq!(loader.load(key.clone()).await, Ok("counters/1@v0".to_owned()));
    loader.clear(key.clone());
    assert_eq!(loader.load(key).await, Ok("counters/1@v1".to_owned()));
    assert_eq!(calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn prime_after_clear_of_a_staged_key_wins_the_cache() {
    let (registry, calls) = versioned_registry();
    let loader = Loader::new(registry, ());
    let key = Key::int(COUNTERS, 1);

    // Ops reach the worker as load, clear, prime within one tick: the
    // waiter keeps the fetch it joined, while the primed value takes the
    // cache entry and is not overwritten when that fetch settles.
    let (first, _) = future::join(loader.load(key.clone()), async {
        loader.clear(key.clone());
        loader.prime(key.clone(), "seeded".to_owned());
    })
    .await;

    assert_eq!(first, Ok("counters/1@v0".to_owned()));
    assert_eq!(loader.load(key).await, Ok("seeded".to_owned()));
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_requests_do_not_share_cache_entries() {
    let (registry, calls) = versioned_registry();
    let first_request = Loader::new(Arc::clone(&registry), ());
    let second_request = Loader::new(registry, ());

    let key = Key::int(COUNTERS, 1);
    let first = first_request.load(key.clone()).await;
    let second = second_request.load(key).await;

    assert_eq!(first, Ok("counters/1@v0".to_owned()));
    assert_eq!(second, Ok("counters/1@v1".to_owned()));
    assert_eq!(calls.lock().unwrap().len(), 2);
}
