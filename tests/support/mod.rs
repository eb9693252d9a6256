#![allow(dead_code)]

use async_trait::async_trait;
use bdp_catalog::app::ports::{BlobStorePort, Publication, PublisherPort, ResourceTransformerPort};
use bdp_catalog::domain::{slugify, Project};
use bdp_catalog::infra::{CsvResourceTransformer, FsBlobStore, HttpMetadataFetcher, ReqwestSourceLoader};
use bdp_catalog::pipeline::resource::Resource;
use bdp_catalog::pipeline::{PipelineContext, TaskQueue};
use bdp_catalog::storage::{InMemoryStorage, RecordStore};
use bdp_catalog::{CatalogError, Result};
use reqwest::Url;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// Filesystem blob store that remembers every key it was asked to store.
pub struct RecordingBlobStore {
    inner: FsBlobStore,
    puts: Mutex<Vec<String>>,
}

impl RecordingBlobStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        Ok(Self {
            inner: FsBlobStore::new(root)?,
            puts: Mutex::new(Vec::new()),
        })
    }

    pub fn keys(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn puts_under(&self, prefix: &str) -> usize {
        self.keys().iter().filter(|k| k.starts_with(prefix)).count()
    }
}

#[async_trait]
impl BlobStorePort for RecordingBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.puts.lock().unwrap().push(key.to_string());
        self.inner.put(key, bytes, content_type).await
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.inner.get(url).await
    }
}

/// Publishing service stand-in. Answers with a numbered page URL unless told
/// to fail.
#[derive(Default)]
pub struct MockPublisher {
    calls: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl MockPublisher {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PublisherPort for MockPublisher {
    async fn publish(&self, data_url: &str, model_url: &str) -> Result<Publication> {
        self.calls
            .lock()
            .unwrap()
            .push((data_url.to_string(), model_url.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Publish("service unavailable".to_string()));
        }
        let n = self.calls.lock().unwrap().len();
        Ok(Publication {
            url: format!("https://openspending.org/budget-{}", n),
        })
    }
}

/// Transformer whose preprocessing panics; model inference is delegated.
pub struct PanickingTransformer;

#[async_trait]
impl ResourceTransformerPort for PanickingTransformer {
    async fn preprocess(&self, _resource: &mut Resource) -> Result<()> {
        panic!("transformer crashed");
    }

    async fn infer_model(&self, resource: &mut Resource) -> Result<Value> {
        CsvResourceTransformer::new().infer_model(resource).await
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub records: Arc<InMemoryStorage>,
    pub blobs: Arc<RecordingBlobStore>,
    pub publisher: Arc<MockPublisher>,
    pub queue: TaskQueue,
}

impl Harness {
    pub fn new() -> Result<Self> {
        Self::with_transformer(Arc::new(CsvResourceTransformer::new()))
    }

    pub fn with_transformer(transformer: Arc<dyn ResourceTransformerPort>) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let records = Arc::new(InMemoryStorage::new());
        let blobs = Arc::new(RecordingBlobStore::new(dir.path().join("blobs"))?);
        let publisher = Arc::new(MockPublisher::default());
        let loader = Arc::new(ReqwestSourceLoader::new());

        let ctx = PipelineContext {
            records: records.clone(),
            blobs: blobs.clone(),
            loader: loader.clone(),
            fetcher: Arc::new(HttpMetadataFetcher::new(loader)),
            transformer,
            publisher: publisher.clone(),
        };

        Ok(Self {
            dir,
            records,
            blobs,
            publisher,
            queue: TaskQueue::new(ctx),
        })
    }

    pub fn source_dir(&self) -> PathBuf {
        let path = self.dir.path().join("source");
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn write_csv(&self, file: &str, content: &str) {
        std::fs::write(self.source_dir().join(file), content).unwrap();
    }

    /// Writes a data package description next to its CSVs and returns its URL.
    pub fn write_package(&self, name: &str, resources: Vec<Value>) -> String {
        let path = self.source_dir().join("datapackage.json");
        let body = json!({ "name": name, "resources": resources });
        std::fs::write(&path, serde_json::to_vec_pretty(&body).unwrap()).unwrap();
        file_url(&path)
    }

    pub async fn project(&self, title: &str) -> Uuid {
        let mut project = Project::new(title, "tester");
        self.records.create_project(&mut project).await.unwrap();
        project.id.unwrap()
    }
}

pub fn file_url(path: &Path) -> String {
    Url::from_file_path(path).unwrap().to_string()
}

pub fn resource_json(name: &str) -> Value {
    json!({
        "name": name,
        "path": format!("{}.csv", slugify(name)),
        "currency": "USD",
        "dateLastUpdated": "2020-03-01",
        "datePublished": "2020-02-15T09:30:00",
        "fiscalYear": "2020",
        "granularity": "aggregated",
        "status": "approved",
        "type": "expenditure",
        "description": format!("{} spending", name),
    })
}

pub const HEALTH_CSV: &str = "Category,Region, Amount \nClinics,North,\"$1,200.00\"\nHospitals,South,(300)\n,,\n";
