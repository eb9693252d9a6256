pub mod blob_store;
pub mod http_client;
pub mod metadata_fetcher;
pub mod publisher;
pub mod transformer;

pub use blob_store::{build_blob_store, FsBlobStore, HttpBlobStore};
pub use http_client::ReqwestSourceLoader;
pub use metadata_fetcher::HttpMetadataFetcher;
pub use publisher::OpenSpendingPublisher;
pub use transformer::CsvResourceTransformer;
