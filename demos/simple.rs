use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gateload::{BatchFetcher, FetcherRegistry, Key, LoadError, Loader, Namespace, RawId};

const MOVIES: Namespace = Namespace::new("movies");

// Trivial fetcher that resolves keys from an in-memory map; a real gateway
// would issue one SQL/REST/gRPC call per batch here.
struct MovieFetcher {
    titles: HashMap<i64, String>,
}

#[async_trait]
impl BatchFetcher<String, String, String> for MovieFetcher {
    async fn fetch(
        &self,
        keys: &[Key],
        viewer: &String,
    ) -> Result<Vec<Result<String, String>>, String> {
        println!("one batched call for {} keys, on behalf of {viewer}", keys.len());
        Ok(keys
            .iter()
            .map(|key| match key.raw_id() {
                RawId::Int(id) => {
                    self.titles.get(id).cloned().ok_or_else(|| format!("no movie {id}"))
                }
                other => Err(format!("unsupported id {other}")),
            })
            .collect())
    }
}

#[tokio::main]
async fn main() {
    let mut titles = HashMap::new();
    titles.insert(2001, "a space odyssey".to_owned());
    titles.insert(7, "samurai".to_owned());
    titles.insert(12, "angry men".to_owned());

    // Assembled once at process start and shared by every request.
    let registry = Arc::new(
        FetcherRegistry::builder().register(MOVIES, MovieFetcher { titles }).build(),
    );

    // One loader per client request, carrying that request's auth context.
    let loader = Loader::new(registry, "viewer-123".to_owned());

    assert_eq!(loader.load(Key::int(MOVIES, 7)).await.as_deref(), Ok("samurai"));
    assert_eq!(
        loader.load(Key::int(MOVIES, 15)).await,
        Err(LoadError::Fetch("no movie 15".to_owned()))
    );

    let batch = loader
        .load_many(vec![Key::int(MOVIES, 12), Key::int(MOVIES, 2010), Key::int(MOVIES, 2001)])
        .await;
    assert_eq!(
        batch,
        vec![
            Ok("angry men".to_owned()),
            Err(LoadError::Fetch("no movie 2010".to_owned())),
            Ok("a space odyssey".to_owned())
        ]
    );
}
