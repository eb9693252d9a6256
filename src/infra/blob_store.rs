use crate::app::ports::BlobStorePort;
use crate::common::config::{BlobBackend, BlobStoreConfig};
use crate::common::constants;
use crate::common::error::{CatalogError, Result};
use crate::domain::slugify;
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn named_key(prefix: &str, name: &str, bytes: &[u8], extension: &str) -> String {
    let slug = slugify(name);
    let slug = if slug.is_empty() { "dataset".to_string() } else { slug };
    let hex = sha256_hex(bytes);
    format!("{}/{}-{}.{}", prefix, slug, &hex[0..12], extension)
}

/// Key for a preprocessed CSV: the dataset name plus a short content digest.
pub fn dataset_key(name: &str, bytes: &[u8]) -> String {
    named_key(constants::DATASETS_PREFIX, name, bytes, "csv")
}

/// Key for a model description.
pub fn model_key(name: &str, bytes: &[u8]) -> String {
    named_key(constants::MODELS_PREFIX, name, bytes, "json")
}

/// Key for an uploaded logo: a unique token followed by the original file
/// name (directory components stripped).
pub fn logo_key(token: &str, filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("logo");
    format!("{}/{}{}", constants::LOGOS_PREFIX, token, base)
}

/// Content-addressed-ish store on the local filesystem; URLs are `file://`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(CatalogError::upload(key, "invalid key"));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStorePort for FsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CatalogError::upload(key, e))?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CatalogError::upload(key, e))?;
        metrics::blobs::upload(size);

        let url = Url::from_file_path(&path)
            .map_err(|_| CatalogError::upload(key, "path is not absolute"))?;
        debug!("Stored {} bytes at {}", size, url);
        Ok(url.to_string())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let path = Url::parse(url)
            .ok()
            .filter(|u| u.scheme() == "file")
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| CatalogError::not_found("Blob", url))?;
        if !path.starts_with(&self.root) {
            return Err(CatalogError::not_found("Blob", url));
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CatalogError::not_found("Blob", url))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Object storage reached over HTTP: objects are PUT to
/// `<endpoint>/<bucket>/<prefix>/<key>` with bearer auth and served from
/// `<public_base_url>/<bucket>/<prefix>/<key>`.
pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    prefix: Option<String>,
    public_base_url: String,
    api_key: Option<String>,
}

impl HttpBlobStore {
    pub fn from_config(config: &BlobStoreConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| CatalogError::Config("blob_store.endpoint is required".to_string()))?;
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| CatalogError::Config("blob_store.bucket is required".to_string()))?;
        let public_base_url = config
            .public_base_url
            .clone()
            .unwrap_or_else(|| endpoint.clone());
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket,
            prefix: config.prefix.clone().filter(|p| !p.is_empty()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn object_path(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}/{}", self.bucket, prefix.trim_end_matches('/'), key),
            None => format!("{}/{}", self.bucket, key),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, self.object_path(key))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req
                .header("Authorization", format!("Bearer {}", key))
                .header("apikey", key.clone()),
            None => req,
        }
    }
}

#[async_trait]
impl BlobStorePort for HttpBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let endpoint = format!("{}/{}", self.endpoint, self.object_path(key));
        let size = bytes.len();
        let resp = self
            .authorize(self.client.put(&endpoint))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .query(&[("upsert", "true")])
            .body(bytes)
            .send()
            .await
            .map_err(|e| CatalogError::upload(key, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CatalogError::upload(key, format!("{} - {}", status, body)));
        }
        metrics::blobs::upload(size);

        let url = self.public_url(key);
        info!("Uploaded {} bytes to {}", size, url);
        Ok(url)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.authorize(self.client.get(url)).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::not_found("Blob", url));
        }
        if !resp.status().is_success() {
            return Err(CatalogError::Fetch {
                url: url.to_string(),
                message: format!("HTTP {}", resp.status()),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

pub fn build_blob_store(config: &BlobStoreConfig) -> Result<Arc<dyn BlobStorePort>> {
    match config.backend {
        BlobBackend::Filesystem => Ok(Arc::new(FsBlobStore::new(&config.root)?)),
        BlobBackend::Http => Ok(Arc::new(HttpBlobStore::from_config(config)?)),
    }
}
