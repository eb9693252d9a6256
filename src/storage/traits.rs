use crate::common::error::{CatalogError, Result};
use crate::domain::*;
use async_trait::async_trait;
use uuid::Uuid;

/// Storage trait for persisting catalog records (projects, data packages, datasets
/// and visualizations). Saves are atomic per record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // Project operations
    async fn create_project(&self, project: &mut Project) -> Result<()>;
    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>>;
    async fn update_project(&self, project: &Project) -> Result<()>;

    // Data package operations
    async fn create_data_package(&self, package: &mut DataPackage) -> Result<()>;
    async fn get_data_package(&self, package_id: Uuid) -> Result<Option<DataPackage>>;
    async fn get_data_packages_by_project(&self, project_id: Uuid) -> Result<Vec<DataPackage>>;

    // Dataset operations
    async fn create_dataset(&self, dataset: &mut Dataset) -> Result<()>;
    async fn get_dataset(&self, dataset_id: Uuid) -> Result<Option<Dataset>>;
    async fn update_dataset(&self, dataset: &Dataset) -> Result<()>;
    async fn get_datasets_by_package(&self, package_id: Uuid) -> Result<Vec<Dataset>>;

    // Visualization operations
    async fn create_visualization(&self, viz: &mut Visualization) -> Result<()>;
    async fn update_visualization(&self, viz: &Visualization) -> Result<()>;
    async fn get_visualizations_by_dataset(&self, dataset_id: Uuid) -> Result<Vec<Visualization>>;

    async fn require_project(&self, project_id: Uuid) -> Result<Project> {
        self.get_project(project_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("Project", project_id))
    }

    async fn require_data_package(&self, package_id: Uuid) -> Result<DataPackage> {
        self.get_data_package(package_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("DataPackage", package_id))
    }

    async fn require_dataset(&self, dataset_id: Uuid) -> Result<Dataset> {
        self.get_dataset(dataset_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("Dataset", dataset_id))
    }
}
