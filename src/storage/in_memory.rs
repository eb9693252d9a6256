use super::traits::RecordStore;
use crate::common::error::{CatalogError, Result};
use crate::domain::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// In-memory record store for development/testing
pub struct InMemoryStorage {
    projects: Arc<Mutex<HashMap<Uuid, Project>>>,
    data_packages: Arc<Mutex<HashMap<Uuid, DataPackage>>>,
    datasets: Arc<Mutex<HashMap<Uuid, Dataset>>>,
    visualizations: Arc<Mutex<HashMap<Uuid, Visualization>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            projects: Arc::new(Mutex::new(HashMap::new())),
            data_packages: Arc::new(Mutex::new(HashMap::new())),
            datasets: Arc::new(Mutex::new(HashMap::new())),
            visualizations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dataset_count(&self) -> usize {
        lock(&self.datasets).len()
    }

    pub fn data_package_count(&self) -> usize {
        lock(&self.data_packages).len()
    }
}

// A panic while holding the lock leaves the map itself intact.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Appends `-2`, `-3`, ... to `base` until `taken` no longer matches.
fn unique_slug(base: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = if base.is_empty() { "item" } else { base };
    if !taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[async_trait]
impl RecordStore for InMemoryStorage {
    async fn create_project(&self, project: &mut Project) -> Result<()> {
        let id = Uuid::new_v4();
        project.id = Some(id);

        let mut projects = lock(&self.projects);
        let base = if project.slug.is_empty() {
            slugify(&project.title)
        } else {
            project.slug.clone()
        };
        project.slug = unique_slug(&base, |s| projects.values().any(|p| p.slug == s));
        projects.insert(id, project.clone());

        debug!("Created project: {} with id {}", project.title, id);
        Ok(())
    }

    async fn get_project(&self, project_id: Uuid) -> Result<Option<Project>> {
        let projects = lock(&self.projects);
        Ok(projects.get(&project_id).cloned())
    }

    async fn update_project(&self, project: &Project) -> Result<()> {
        let project_id = project.id.ok_or_else(|| {
            CatalogError::MissingField("Cannot update project without ID".to_string())
        })?;

        let mut projects = lock(&self.projects);
        if !projects.contains_key(&project_id) {
            return Err(CatalogError::not_found("Project", project_id));
        }
        projects.insert(project_id, project.clone());

        debug!("Updated project: {} with id {}", project.title, project_id);
        Ok(())
    }

    async fn create_data_package(&self, package: &mut DataPackage) -> Result<()> {
        let id = Uuid::new_v4();
        package.id = Some(id);

        let mut packages = lock(&self.data_packages);
        let base = if package.slug.is_empty() {
            slugify(&package.name)
        } else {
            package.slug.clone()
        };
        let project_id = package.project_id;
        package.slug = unique_slug(&base, |s| {
            packages
                .values()
                .any(|p| p.project_id == project_id && p.slug == s)
        });
        packages.insert(id, package.clone());

        debug!("Created data package: {} with id {}", package.name, id);
        Ok(())
    }

    async fn get_data_package(&self, package_id: Uuid) -> Result<Option<DataPackage>> {
        let packages = lock(&self.data_packages);
        Ok(packages.get(&package_id).cloned())
    }

    async fn get_data_packages_by_project(&self, project_id: Uuid) -> Result<Vec<DataPackage>> {
        let packages = lock(&self.data_packages);
        let mut project_packages: Vec<DataPackage> = packages
            .values()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect();
        project_packages.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(project_packages)
    }

    async fn create_dataset(&self, dataset: &mut Dataset) -> Result<()> {
        let id = Uuid::new_v4();
        dataset.id = Some(id);

        let mut datasets = lock(&self.datasets);
        datasets.insert(id, dataset.clone());

        debug!("Created dataset: {} with id {}", dataset.name, id);
        Ok(())
    }

    async fn get_dataset(&self, dataset_id: Uuid) -> Result<Option<Dataset>> {
        let datasets = lock(&self.datasets);
        Ok(datasets.get(&dataset_id).cloned())
    }

    async fn update_dataset(&self, dataset: &Dataset) -> Result<()> {
        let dataset_id = dataset.id.ok_or_else(|| {
            CatalogError::MissingField("Cannot update dataset without ID".to_string())
        })?;

        let mut datasets = lock(&self.datasets);
        if !datasets.contains_key(&dataset_id) {
            return Err(CatalogError::not_found("Dataset", dataset_id));
        }
        datasets.insert(dataset_id, dataset.clone());

        debug!("Updated dataset: {} with id {}", dataset.name, dataset_id);
        Ok(())
    }

    async fn get_datasets_by_package(&self, package_id: Uuid) -> Result<Vec<Dataset>> {
        let datasets = lock(&self.datasets);
        let mut package_datasets: Vec<Dataset> = datasets
            .values()
            .filter(|d| d.datapackage_id == Some(package_id))
            .cloned()
            .collect();
        package_datasets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(package_datasets)
    }

    async fn create_visualization(&self, viz: &mut Visualization) -> Result<()> {
        let id = Uuid::new_v4();
        viz.id = Some(id);

        let mut visualizations = lock(&self.visualizations);
        visualizations.insert(id, viz.clone());

        debug!("Created {} visualization with id {}", viz.viz_type, id);
        Ok(())
    }

    async fn update_visualization(&self, viz: &Visualization) -> Result<()> {
        let viz_id = viz.id.ok_or_else(|| {
            CatalogError::MissingField("Cannot update visualization without ID".to_string())
        })?;

        let mut visualizations = lock(&self.visualizations);
        if !visualizations.contains_key(&viz_id) {
            return Err(CatalogError::not_found("Visualization", viz_id));
        }
        visualizations.insert(viz_id, viz.clone());
        Ok(())
    }

    async fn get_visualizations_by_dataset(&self, dataset_id: Uuid) -> Result<Vec<Visualization>> {
        let visualizations = lock(&self.visualizations);
        let mut dataset_viz: Vec<Visualization> = visualizations
            .values()
            .filter(|v| v.dataset_id == dataset_id)
            .cloned()
            .collect();
        dataset_viz.sort_by_key(|v| v.order);
        Ok(dataset_viz)
    }
}
