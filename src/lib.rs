//! Request-scoped batching, deduplication, and caching for GraphQL field
//! resolvers: the layer between resolvers and backend services that turns
//! many same-tick single-key loads into one batched fetch per backend,
//! mitigating the N+1 problem.

mod batch_fetcher;
mod cache;
mod config;
mod dispatcher;
mod error;
mod key;
mod loader;
mod loader_op;
mod loader_worker;
#[cfg(feature = "stats")]
mod worker_stats;

pub use batch_fetcher::{BatchFetcher, FetcherRegistry, FetcherRegistryBuilder};
pub use config::LoaderConfig;
pub use error::{ContractViolation, LoadError, LoadResult};
pub use key::{Key, Namespace, RawId};
pub use loader::Loader;
