//! Schema resolution, fetching and caching

mod cache;
mod fetch;
mod resolver;
pub mod vocabulary;

pub use cache::SchemaCache;
pub use fetch::{fetch_all, HttpSchemaFetcher, SchemaEntry, SchemaFetchError, SchemaFetcher};
pub use resolver::{uri_scheme, DocumentKind, SchemaResolver};
