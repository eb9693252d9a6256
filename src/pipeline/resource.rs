use crate::app::ports::SourceLoaderPort;
use crate::common::error::{CatalogError, Result};
use crate::domain::{DataPackage, Dataset};
use crate::pipeline::descriptor::{required, ResourceDescriptor};
use reqwest::Url;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Lazily loaded CSV data behind a URL. Nothing is read until the content is
/// first requested; a transformer may then replace the content in place.
pub struct CsvHandle {
    url: String,
    loader: Arc<dyn SourceLoaderPort>,
    content: Option<Vec<u8>>,
}

impl CsvHandle {
    pub fn new(url: impl Into<String>, loader: Arc<dyn SourceLoaderPort>) -> Self {
        Self {
            url: url.into(),
            loader,
            content: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_loaded(&self) -> bool {
        self.content.is_some()
    }

    pub async fn content(&mut self) -> Result<&[u8]> {
        if self.content.is_none() {
            let bytes = self.loader.load(&self.url).await?;
            self.content = Some(bytes);
        }
        Ok(self.content.as_deref().unwrap_or_default())
    }

    pub fn replace_content(&mut self, bytes: Vec<u8>) {
        self.content = Some(bytes);
    }

    /// Serialized form of the (possibly transformed) data.
    pub async fn serialize(&mut self) -> Result<Vec<u8>> {
        Ok(self.content().await?.to_vec())
    }
}

impl fmt::Debug for CsvHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvHandle")
            .field("url", &self.url)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Descriptive fields handed to the transformer alongside the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub path: Option<String>,
    pub name: String,
    pub currency: String,
    pub date_last_updated: String,
    pub date_published: String,
    /// Four-character year token, e.g. "2020"
    pub fiscal_year: String,
    pub granularity: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: String,
}

#[derive(Debug)]
pub struct Resource {
    pub data: CsvHandle,
    pub metadata: ResourceMetadata,
}

/// Which artifact a reconstructed resource reads its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Original,
    Preprocessed,
}

/// Resolves `reference` against `base` the way a browser resolves a link:
/// absolute references win, relative ones replace the last path segment.
pub fn resolve_url(base: Option<&str>, reference: &str) -> Result<String> {
    if let Ok(absolute) = Url::parse(reference) {
        return Ok(absolute.to_string());
    }
    let base = base.ok_or_else(|| {
        CatalogError::Transform(format!(
            "relative path '{}' has no data package URL to resolve against",
            reference
        ))
    })?;
    let base = Url::parse(base)
        .map_err(|e| CatalogError::Transform(format!("invalid data package URL '{}': {}", base, e)))?;
    base.join(reference)
        .map(|u| u.to_string())
        .map_err(|e| CatalogError::Transform(format!("cannot resolve '{}': {}", reference, e)))
}

/// Rebuilds the resource description a stage works on from the stored
/// dataset and its package.
pub fn reconstruct_resource(
    dataset: &Dataset,
    package: Option<&DataPackage>,
    source: DataSource,
    loader: Arc<dyn SourceLoaderPort>,
) -> Result<Resource> {
    let reference = match source {
        DataSource::Original => dataset
            .path
            .as_deref()
            .ok_or_else(|| CatalogError::MissingField("path".to_string()))?,
        DataSource::Preprocessed => dataset
            .preprocessed
            .as_deref()
            .ok_or_else(|| CatalogError::MissingField("preprocessed".to_string()))?,
    };
    let url = resolve_url(package.and_then(|p| p.path.as_deref()), reference)?;

    let fiscal_year = dataset
        .fiscal_year
        .map(|d| d.to_string().chars().take(4).collect())
        .unwrap_or_default();

    Ok(Resource {
        data: CsvHandle::new(url, loader),
        metadata: ResourceMetadata {
            path: dataset.path.clone(),
            name: dataset.name.clone(),
            currency: dataset.currency.clone(),
            date_last_updated: dataset.date_last_updated.to_string(),
            date_published: dataset.date_published.to_string(),
            fiscal_year,
            granularity: dataset.granularity.clone(),
            status: dataset.status.clone(),
            resource_type: dataset.dataset_type.clone(),
        },
    })
}

/// Builds a resource straight from its description, for uploads that never
/// create a dataset record. Dates stay as written in the description.
pub fn resource_from_descriptor(
    described: &ResourceDescriptor,
    metadata_url: &str,
    loader: Arc<dyn SourceLoaderPort>,
) -> Result<Resource> {
    let path = required(&described.path, "path")?;
    let url = resolve_url(Some(metadata_url), path)?;

    Ok(Resource {
        data: CsvHandle::new(url, loader),
        metadata: ResourceMetadata {
            path: Some(path.to_string()),
            name: required(&described.name, "name")?.to_string(),
            currency: required(&described.currency, "currency")?.to_string(),
            date_last_updated: required(&described.date_last_updated, "dateLastUpdated")?.to_string(),
            date_published: required(&described.date_published, "datePublished")?.to_string(),
            fiscal_year: described
                .fiscal_year
                .as_deref()
                .unwrap_or_default()
                .chars()
                .take(4)
                .collect(),
            granularity: described.granularity.clone(),
            status: described.status.clone(),
            resource_type: required(&described.resource_type, "type")?.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingLoader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SourceLoaderPort for CountingLoader {
        async fn load(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(b"a,b\n1,2\n".to_vec())
        }
    }

    fn dataset() -> Dataset {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Dataset {
            id: Some(Uuid::new_v4()),
            datapackage_id: None,
            project_id: Uuid::new_v4(),
            created: Utc::now(),
            preprocessed: None,
            datamodel: None,
            openspending: None,
            path: Some("data/health.csv".to_string()),
            name: "Health".to_string(),
            currency: "USD".to_string(),
            date_last_updated: date,
            date_published: date,
            fiscal_year: Some(date),
            granularity: Some("monthly".to_string()),
            status: Some("final".to_string()),
            dataset_type: "expenditure".to_string(),
            description: None,
            pipeline_status: None,
        }
    }

    fn package() -> DataPackage {
        DataPackage {
            id: Some(Uuid::new_v4()),
            name: "Budget2020".to_string(),
            slug: "budget2020".to_string(),
            path: Some("https://example.org/bdp/datapackage.json".to_string()),
            project_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url(Some("https://example.org/bdp/datapackage.json"), "health.csv").unwrap(),
            "https://example.org/bdp/health.csv"
        );
        assert_eq!(
            resolve_url(Some("https://example.org/bdp/datapackage.json"), "https://cdn.org/x.csv")
                .unwrap(),
            "https://cdn.org/x.csv"
        );
        assert!(resolve_url(None, "health.csv").is_err());
    }

    #[test]
    fn test_reconstruct_uses_original_path_and_truncates_fiscal_year() {
        let loader = Arc::new(CountingLoader { calls: AtomicUsize::new(0) });
        let resource =
            reconstruct_resource(&dataset(), Some(&package()), DataSource::Original, loader).unwrap();

        assert_eq!(resource.data.url(), "https://example.org/bdp/data/health.csv");
        assert_eq!(resource.metadata.fiscal_year, "2020");
        assert_eq!(resource.metadata.date_published, "2020-01-01 00:00:00");
        assert_eq!(resource.metadata.resource_type, "expenditure");
        assert!(!resource.data.is_loaded());
    }

    #[test]
    fn test_reconstruct_preprocessed_requires_artifact() {
        let loader = Arc::new(CountingLoader { calls: AtomicUsize::new(0) });
        let err = reconstruct_resource(&dataset(), Some(&package()), DataSource::Preprocessed, loader)
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingField(ref f) if f == "preprocessed"));
    }

    #[tokio::test]
    async fn test_handle_loads_once() {
        let loader = Arc::new(CountingLoader { calls: AtomicUsize::new(0) });
        let mut handle = CsvHandle::new("file:///tmp/x.csv", loader.clone());
        handle.content().await.unwrap();
        handle.serialize().await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        handle.replace_content(b"c\n3\n".to_vec());
        assert_eq!(handle.serialize().await.unwrap(), b"c\n3\n".to_vec());
    }

    #[test]
    fn test_resource_from_descriptor_resolves_against_metadata_url() {
        let described: ResourceDescriptor = serde_json::from_value(serde_json::json!({
            "name": "Health",
            "path": "health.csv",
            "currency": "USD",
            "dateLastUpdated": "2020-03-01",
            "datePublished": "2020-02-15",
            "fiscalYear": "2020-01-01",
            "type": "expenditure",
        }))
        .unwrap();
        let loader = Arc::new(CountingLoader { calls: AtomicUsize::new(0) });

        let resource =
            resource_from_descriptor(&described, "https://example.org/bdp/datapackage.json", loader)
                .unwrap();
        assert_eq!(resource.data.url(), "https://example.org/bdp/health.csv");
        assert_eq!(resource.metadata.fiscal_year, "2020");
        assert_eq!(resource.metadata.date_published, "2020-02-15");

        let mut missing = described.clone();
        missing.currency = None;
        let loader = Arc::new(CountingLoader { calls: AtomicUsize::new(0) });
        let err = resource_from_descriptor(&missing, "https://example.org/bdp/datapackage.json", loader)
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingField(ref f) if f == "currency"));
    }
}
