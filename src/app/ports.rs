use crate::common::error::Result;
use crate::pipeline::descriptor::DataPackageDescriptor;
use crate::pipeline::resource::Resource;
use async_trait::async_trait;

// Ingest-side ports
#[async_trait]
pub trait SourceLoaderPort: Send + Sync {
    /// Reads the full body behind `url` (http, https or file).
    async fn load(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait MetadataFetcherPort: Send + Sync {
    /// Fetches and decodes a data package description.
    async fn fetch(&self, url: &str) -> Result<DataPackageDescriptor>;
}

// Processing ports
#[async_trait]
pub trait ResourceTransformerPort: Send + Sync {
    /// Cleans the resource's tabular data, replacing its serialized form in place.
    async fn preprocess(&self, resource: &mut Resource) -> Result<()>;

    /// Derives a model description from the resource's data and metadata.
    async fn infer_model(&self, resource: &mut Resource) -> Result<serde_json::Value>;
}

// Output ports
#[async_trait]
pub trait BlobStorePort: Send + Sync {
    /// Stores `bytes` under `key` and returns a URL the object can be read back from.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
    async fn get(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publication {
    pub url: String,
}

#[async_trait]
pub trait PublisherPort: Send + Sync {
    async fn publish(&self, data_url: &str, model_url: &str) -> Result<Publication>;
}
