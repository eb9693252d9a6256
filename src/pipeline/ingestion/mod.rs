// Ingestion: turn a fetched data package description into catalog records

use crate::common::error::{CatalogError, Result};
use crate::domain::{DataPackage, Dataset};
use crate::observability::metrics;
use crate::pipeline::descriptor::{parse_resource_date, required, ResourceDescriptor};
use crate::pipeline::queue::{Task, TaskQueue};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

/// Fetches the description at `metadata_url`, stores one data package for it
/// under `project_id` and schedules one dataset-creation unit per resource.
///
/// Returns once the units are scheduled, not once they have run. A fetch
/// failure aborts before anything is stored.
pub async fn create_data_package(
    queue: &TaskQueue,
    project_id: Uuid,
    metadata_url: &str,
    auto_upload: bool,
) -> Result<bool> {
    let ctx = queue.context();

    let descriptor = match ctx.fetcher.fetch(metadata_url).await {
        Ok(descriptor) => descriptor,
        Err(e) => {
            metrics::ingest::fetch_error();
            error!("Could not fetch data package from {}: {}", metadata_url, e);
            return Err(e);
        }
    };
    ctx.records.require_project(project_id).await?;

    let mut package = DataPackage {
        id: None,
        name: descriptor.name.clone(),
        slug: String::new(),
        path: Some(metadata_url.to_string()),
        project_id,
    };
    ctx.records.create_data_package(&mut package).await?;
    let package_id = package
        .id
        .ok_or_else(|| CatalogError::MissingField("data package id".to_string()))?;
    metrics::ingest::package_ingested();

    info!(
        "📦 Created data package '{}' ({}), scheduling {} datasets",
        package.name,
        package_id,
        descriptor.resources.len()
    );

    for resource in descriptor.resources {
        queue.submit(Task::CreateDataset {
            project_id,
            package_id,
            resource,
            auto_upload,
        });
    }
    Ok(true)
}

/// Copies a resource description onto a new dataset record, parsing its
/// date fields. With `auto_upload` the publication chain is scheduled for it.
pub fn dataset_from_resource(
    project_id: Uuid,
    package_id: Uuid,
    resource: &ResourceDescriptor,
) -> Result<Dataset> {
    let date_last_updated = parse_resource_date(
        "dateLastUpdated",
        required(&resource.date_last_updated, "dateLastUpdated")?,
    )?;
    let date_published = parse_resource_date(
        "datePublished",
        required(&resource.date_published, "datePublished")?,
    )?;
    let fiscal_year = resource
        .fiscal_year
        .as_deref()
        .map(|v| parse_resource_date("fiscalYear", v))
        .transpose()?;

    Ok(Dataset {
        id: None,
        datapackage_id: Some(package_id),
        project_id,
        created: Utc::now(),
        preprocessed: None,
        datamodel: None,
        openspending: None,
        path: Some(required(&resource.path, "path")?.to_string()),
        name: required(&resource.name, "name")?.to_string(),
        currency: required(&resource.currency, "currency")?.to_string(),
        date_last_updated,
        date_published,
        fiscal_year,
        granularity: resource.granularity.clone(),
        status: resource.status.clone(),
        dataset_type: required(&resource.resource_type, "type")?.to_string(),
        description: Some(resource.description.clone().unwrap_or_default()),
        pipeline_status: None,
    })
}

/// Stores one dataset for `resource`. Returns true once the record is saved,
/// whatever later happens to its publication.
pub async fn create_dataset(
    queue: &TaskQueue,
    project_id: Uuid,
    package_id: Uuid,
    resource: &ResourceDescriptor,
    auto_upload: bool,
) -> Result<bool> {
    let ctx = queue.context();

    let mut dataset = match dataset_from_resource(project_id, package_id, resource) {
        Ok(dataset) => dataset,
        Err(e) => {
            metrics::ingest::dataset_failed();
            error!("Skipping resource {}: {}", resource.display_name(), e);
            return Err(e);
        }
    };
    ctx.records.create_dataset(&mut dataset).await?;
    let dataset_id = dataset
        .id
        .ok_or_else(|| CatalogError::MissingField("dataset id".to_string()))?;
    metrics::ingest::dataset_created();
    info!("Created dataset '{}' ({})", dataset.name, dataset_id);

    if auto_upload {
        queue.submit_publication(dataset_id);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource() -> ResourceDescriptor {
        ResourceDescriptor {
            name: Some("Health".to_string()),
            path: Some("health.csv".to_string()),
            currency: Some("USD".to_string()),
            date_last_updated: Some("2020-01-01".to_string()),
            date_published: Some("2020-01-02".to_string()),
            fiscal_year: Some("2020-01-01".to_string()),
            granularity: Some("monthly".to_string()),
            status: Some("final".to_string()),
            resource_type: Some("expenditure".to_string()),
            ..ResourceDescriptor::default()
        }
    }

    #[test]
    fn test_fields_are_copied() {
        let project_id = Uuid::new_v4();
        let package_id = Uuid::new_v4();
        let d = dataset_from_resource(project_id, package_id, &resource()).unwrap();

        assert_eq!(d.name, "Health");
        assert_eq!(d.datapackage_id, Some(package_id));
        assert_eq!(d.project_id, project_id);
        assert_eq!(d.date_published.to_string(), "2020-01-02 00:00:00");
        assert_eq!(d.fiscal_year.map(|f| f.to_string()).as_deref(), Some("2020-01-01 00:00:00"));
        assert_eq!(d.description.as_deref(), Some(""));
        assert!(d.preprocessed.is_none() && d.datamodel.is_none() && d.openspending.is_none());
    }

    #[test]
    fn test_bad_date_is_date_parse_error() {
        let mut r = resource();
        r.date_published = Some("sometime".to_string());
        let err = dataset_from_resource(Uuid::new_v4(), Uuid::new_v4(), &r).unwrap_err();
        assert!(matches!(err, CatalogError::DateParse { ref field, .. } if field == "datePublished"));
    }

    #[test]
    fn test_missing_currency_is_reported() {
        let mut r = resource();
        r.currency = None;
        let err = dataset_from_resource(Uuid::new_v4(), Uuid::new_v4(), &r).unwrap_err();
        assert!(matches!(err, CatalogError::MissingField(ref f) if f == "currency"));
    }
}
