use crate::app::ports::{MetadataFetcherPort, SourceLoaderPort};
use crate::common::error::{CatalogError, Result};
use crate::pipeline::descriptor::DataPackageDescriptor;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Reads a `datapackage.json` style description through a source loader.
pub struct HttpMetadataFetcher {
    loader: Arc<dyn SourceLoaderPort>,
}

impl HttpMetadataFetcher {
    pub fn new(loader: Arc<dyn SourceLoaderPort>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl MetadataFetcherPort for HttpMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<DataPackageDescriptor> {
        let fetch_err = |message: String| CatalogError::Fetch {
            url: url.to_string(),
            message,
        };

        let bytes = self.loader.load(url).await.map_err(|e| match e {
            CatalogError::Fetch { .. } => e,
            other => fetch_err(other.to_string()),
        })?;
        let descriptor: DataPackageDescriptor =
            serde_json::from_slice(&bytes).map_err(|e| fetch_err(format!("malformed description: {}", e)))?;

        info!(
            "Fetched data package '{}' with {} resources",
            descriptor.name,
            descriptor.resources.len()
        );
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ReqwestSourceLoader;
    use reqwest::Url;

    #[tokio::test]
    async fn test_malformed_description_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datapackage.json");
        std::fs::write(&path, "{ not json").unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let fetcher = HttpMetadataFetcher::new(Arc::new(ReqwestSourceLoader::new()));
        let err = fetcher.fetch(url.as_str()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Fetch { ref message, .. } if message.contains("malformed")));
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("absent.json")).unwrap();

        let fetcher = HttpMetadataFetcher::new(Arc::new(ReqwestSourceLoader::new()));
        let err = fetcher.fetch(url.as_str()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Fetch { .. }));
    }
}
