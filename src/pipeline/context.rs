use crate::app::ports::{
    BlobStorePort, MetadataFetcherPort, PublisherPort, ResourceTransformerPort, SourceLoaderPort,
};
use crate::storage::RecordStore;
use std::sync::Arc;

/// Collaborators every unit of work is executed against. Cloning is cheap;
/// each worker gets its own clone.
#[derive(Clone)]
pub struct PipelineContext {
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStorePort>,
    pub loader: Arc<dyn SourceLoaderPort>,
    pub fetcher: Arc<dyn MetadataFetcherPort>,
    pub transformer: Arc<dyn ResourceTransformerPort>,
    pub publisher: Arc<dyn PublisherPort>,
}
