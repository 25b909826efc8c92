use std::sync::Arc;

use async_trait::async_trait;
use gateload::{
    BatchFetcher, ContractViolation, FetcherRegistry, Key, LoadError, Loader, Namespace, RawId,
};

const USERS: Namespace = Namespace::new("users");

/// Fails per key for odd ids, succeeds for even ids.
struct OddsFailFetcher;

#[async_trait]
impl BatchFetcher<i64, String, ()> for OddsFailFetcher {
    async fn fetch(&self, keys: &[Key], _auth: &()) -> Result<Vec<Result<i64, String>>, String> {
        Ok(keys
            .iter()
            .map(|key| match key.raw_id() {
                RawId::Int(id) if id % 2 == 0 => Ok(*id),
                RawId::Int(id) => Err(format!("forbidden: {id}")),
                other => Err(format!("unsupported id {other}")),
            })
            .collect())
    }
}

/// Fails the whole invocation, as a backend outage would.
struct OutageFetcher;

#[async_trait]
impl BatchFetcher<i64, String, ()> for OutageFetcher {
    async fn fetch(&self, _keys: &[Key], _auth: &()) -> Result<Vec<Result<i64, String>>, String> {
        Err("connection refused".to_owned())
    }
}

/// Drops every result, violating the alignment contract.
struct DroppingFetcher;

#[async_trait]
impl BatchFetcher<i64, String, ()> for DroppingFetcher {
    async fn fetch(&self, _keys: &[Key], _auth: &()) -> Result<Vec<Result<i64, String>>, String> {
        Ok(Vec::new())
    }
}

fn loader_with(fetcher: impl BatchFetcher<i64, String, ()> + 'static) -> Loader<i64, String> {
    let registry = Arc::new(FetcherRegistry::builder().register(USERS, fetcher).build());
    Loader::new(registry, ())
}

#[tokio::test]
async fn per_key_errors_leave_other_keys_intact() {
    let loader = loader_with(OddsFailFetcher);

    let results = loader
        .load_many(vec![Key::int(USERS, 2), Key::int(USERS, 3), Key::int(USERS, 4)])
        .await;

    assert_eq!(
        results,
        vec![Ok(2), Err(LoadError::Fetch("forbidden: 3".to_owned())), Ok(4)]
    );
}

#[tokio::test]
async fn whole_batch_failure_rejects_every_key() {
    let loader = loader_with(OutageFetcher);

    let results = loader.load_many(vec![Key::int(USERS, 1), Key::int(USERS, 2)]).await;

    assert_eq!(
        results,
        vec![
            Err(LoadError::Batch("connection refused".to_owned())),
            Err(LoadError::Batch("connection refused".to_owned()))
        ]
    );
}

#[tokio::test]
async fn misaligned_results_reject_the_batch_loudly() {
    let loader = loader_with(DroppingFetcher);

    let results = loader.load_many(vec![Key::int(USERS, 1), Key::int(USERS, 2)]).await;

    let violation = ContractViolation { namespace: USERS, expected: 2, actual: 0 };
    assert_eq!(
        results,
        vec![
            Err(LoadError::Contract(violation.clone())),
            Err(LoadError::Contract(violation))
        ]
    );
}

#[tokio::test]
async fn per_key_error_is_cached_like_a_value() {
    let loader = loader_with(OddsFailFetcher);

    let key = Key::int(USERS, 7);
    let first = loader.load(key.clone()).await;
    let second = loader.load(key).await;

    assert_eq!(first, Err(LoadError::Fetch("forbidden: 7".to_owned())));
    assert_eq!(second, first);
}

#[tokio::test]
async fn unknown_namespace_fails_fast() {
    let loader = loader_with(OddsFailFetcher);

    const GHOSTS: Namespace = Namespace::new("ghosts");
    let result = loader.load(Key::int(GHOSTS, 1)).await;

    assert_eq!(result, Err(LoadError::UnknownNamespace(GHOSTS)));
}
