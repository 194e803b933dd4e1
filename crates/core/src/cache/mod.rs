pub mod fetcher;
pub mod key;
pub mod query_cache;
pub mod snapshot;
pub mod store;
